use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::error::{NightfallError, Result};
use crate::io::source::{FileSource, ImageSource};
use crate::registry::BlockRegistry;

use super::config::{Execution, SequenceConfig};
use super::parallel::ParallelSequence;
use super::report::DiscardRecord;
use super::sequence::Sequence;
use super::types::{ProgressReporter, RunOptions};

/// What a configured run leaves behind.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub processed: usize,
    pub processing_time: Duration,
    /// Rendered per-block timing table(s).
    pub timing: String,
    pub citations: Vec<String>,
    pub discards: Vec<DiscardRecord>,
}

/// Images to process: explicit inputs, or every light frame of the source.
fn resolve_inputs(config: &SequenceConfig, source: &FileSource) -> Vec<PathBuf> {
    if config.inputs.is_empty() {
        source.get(crate::consts::KIND_LIGHT)
    } else {
        config.inputs.clone()
    }
}

fn build_source(config: &SequenceConfig) -> Result<FileSource> {
    let mut source = match &config.input_dir {
        Some(dir) => FileSource::scan(dir)?,
        None => FileSource::new(),
    };
    if let Some(path) = &config.stack_image {
        source.set_stack(path);
    }
    Ok(source)
}

/// Build the sequence a config describes and run it.
pub fn run_config(
    config: &SequenceConfig,
    registry: &BlockRegistry,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<RunSummary> {
    let source = build_source(config)?;
    let inputs = resolve_inputs(config, &source);
    if inputs.is_empty() {
        return Err(NightfallError::EmptySequence);
    }
    info!(
        name = %config.name,
        images = inputs.len(),
        execution = ?config.execution,
        "Running configured sequence"
    );

    let source: Arc<dyn ImageSource> = Arc::new(source);
    let options = RunOptions {
        show_progress: config.show_progress,
        live_discard: config.live_discard,
        telescope: config.telescope.clone(),
        ..RunOptions::default()
    };

    match config.execution {
        Execution::Sequential => {
            let mut descriptors = config.blocks.clone();
            descriptors.extend(config.data_blocks.iter().cloned());
            let mut sequence = Sequence::from_descriptors(&descriptors, registry)?
                .named(&config.name)
                .with_source(source)
                .with_reporter(reporter);
            sequence.run(inputs, &options)?;
            Ok(RunSummary {
                processed: sequence.n_processed_images(),
                processing_time: sequence.processing_time(),
                timing: sequence.to_string(),
                citations: sequence.citations(),
                discards: sequence.discards(),
            })
        }
        Execution::Parallel { workers } => {
            let main = Sequence::from_descriptors(&config.blocks, registry)?;
            let data = if config.data_blocks.is_empty() {
                None
            } else {
                Some(Sequence::from_descriptors(&config.data_blocks, registry)?)
            };
            let mut parallel = ParallelSequence::from_sequences(main, data)
                .named(&config.name)
                .with_source(source)
                .with_reporter(reporter);
            if let Some(workers) = workers {
                parallel = parallel.with_workers(workers);
            }
            parallel.run(inputs, &options, None)?;

            let mut timing = parallel.main().to_string();
            let mut discards = parallel.main().discards();
            if let Some(data) = parallel.data() {
                timing.push_str(&data.to_string());
                discards.extend(data.discards());
            }
            Ok(RunSummary {
                processed: parallel.n_processed_images(),
                processing_time: parallel.processing_time(),
                timing,
                citations: parallel.citations(),
                discards,
            })
        }
    }
}

