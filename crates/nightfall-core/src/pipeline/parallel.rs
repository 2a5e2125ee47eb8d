use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::block::Block;
use crate::error::{NightfallError, Result};
use crate::image::{Image, Metadata};
use crate::io::loader::ImageLoader;
use crate::io::source::ImageSource;

use super::helpers::{load_input, run_image};
use super::sequence::Sequence;
use super::types::{ImageInput, NoOpReporter, ProgressReporter, RunOptions, SequenceStage};

/// What a worker hands back for one image. Nothing else crosses the worker
/// boundary: blocks inside a worker are private copies.
struct WorkerOutput {
    position: usize,
    image: Image,
    timings: Vec<Duration>,
    discarded_by: Option<usize>,
}

/// Sequence whose per-image chain runs on a worker pool.
///
/// Every worker gets its own copy of the (already initialized) main-chain
/// blocks. Blocks that accumulate state across images must be passed as
/// `data_blocks`: they form a regular [`Sequence`] fed on the calling thread,
/// one image at a time, in the order workers complete them.
pub struct ParallelSequence {
    main: Sequence,
    data: Option<Sequence>,
    workers: usize,
}

impl ParallelSequence {
    pub fn new(blocks: Vec<Box<dyn Block>>, data_blocks: Option<Vec<Box<dyn Block>>>) -> Self {
        Self::from_sequences(Sequence::new(blocks), data_blocks.map(Sequence::new))
    }

    pub fn from_sequences(main: Sequence, data: Option<Sequence>) -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            main,
            data,
            workers,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.main = self.main.named(name);
        self
    }

    /// Number of pool threads. Defaults to the available hardware concurrency.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn ImageLoader>) -> Self {
        self.main = self.main.with_loader(loader);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn ImageSource>) -> Self {
        self.main = self.main.with_source(Arc::clone(&source));
        self.data = self.data.map(|d| d.with_source(source));
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.main = self.main.with_reporter(reporter);
        self
    }

    pub fn with_stack_image(mut self, image: Image) -> Self {
        self.main = self.main.with_stack_image(image);
        self
    }

    /// Fail if any main-chain block is a data block.
    pub fn check_data_blocks(&self) -> Result<()> {
        let offending: BTreeSet<&str> = self
            .main
            .blocks
            .iter()
            .filter(|b| b.is_data_block())
            .map(|b| b.kind())
            .collect();
        if offending.is_empty() {
            Ok(())
        } else {
            Err(NightfallError::DataBlockInParallel(
                offending.into_iter().collect::<Vec<_>>().join(", "),
            ))
        }
    }

    /// Run every input through the main chain on the worker pool, feeding
    /// completed images to the data blocks.
    ///
    /// `globals` is accepted for callers that share run-wide values; it is not
    /// used by the engine itself. Main-chain blocks are terminated on the
    /// calling thread along with the data blocks when `options.terminate` is set.
    pub fn run<I: Into<ImageInput>>(
        &mut self,
        inputs: Vec<I>,
        options: &RunOptions,
        globals: Option<&Metadata>,
    ) -> Result<()> {
        self.check_data_blocks()?;

        let inputs: Vec<ImageInput> = inputs.into_iter().map(Into::into).collect();
        if inputs.is_empty() {
            return Err(NightfallError::EmptySequence);
        }
        if let Some(globals) = globals {
            debug!(globals = globals.len(), "Globals passed through");
        }

        let total = inputs.len();
        let reporter = self.main.reporter_for(options);
        info!(
            sequence = %self.main.name,
            images = total,
            workers = self.workers,
            "Running parallel sequence"
        );

        self.main
            .begin(reporter.as_ref(), options.telescope.as_deref())?;
        if let Some(data) = self.data.as_mut() {
            data.begin(&NoOpReporter, options.telescope.as_deref())?;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| NightfallError::WorkerPool(e.to_string()))?;

        let template: Vec<Box<dyn Block>> = self.main.blocks.iter().map(|b| b.clone_block()).collect();
        let loader = Arc::clone(&self.main.loader);
        let stack = self.main.stack_image().cloned();
        let telescope = options.telescope.clone();
        let failed = AtomicBool::new(false);

        reporter.begin_stage(SequenceStage::Processing, Some(total));
        // Bounded so workers cannot run far ahead of the coordinator.
        let (tx, rx) = mpsc::sync_channel::<Result<WorkerOutput>>(self.workers);

        let outcome = std::thread::scope(|scope| {
            let template = &template;
            let loader = loader.as_ref();
            let stack = stack.as_ref();
            let telescope = telescope.as_deref();
            let failed = &failed;
            let pool = &pool;

            scope.spawn(move || {
                let tx = tx;
                pool.install(|| {
                    inputs.into_par_iter().enumerate().for_each_init(
                        || {
                            let blocks: Vec<Box<dyn Block>> =
                                template.iter().map(|b| b.clone_block()).collect();
                            (tx.clone(), blocks)
                        },
                        |(tx, blocks), (position, input)| {
                            if failed.load(Ordering::Relaxed) {
                                return;
                            }
                            let result =
                                process_in_worker(blocks, input, position, loader, telescope, stack);
                            if result.is_err() {
                                failed.store(true, Ordering::Relaxed);
                            }
                            let _ = tx.send(result);
                        },
                    );
                });
            });

            let mut done = 0;
            for message in rx {
                let output = match message {
                    Ok(output) => output,
                    Err(e) => {
                        failed.store(true, Ordering::Relaxed);
                        return Err(e);
                    }
                };
                if let Err(e) = self.absorb(output, options.live_discard) {
                    failed.store(true, Ordering::Relaxed);
                    return Err(e);
                }
                done += 1;
                reporter.advance(done);
            }
            Ok(())
        });
        reporter.finish_stage();
        outcome?;

        self.main.finish(options, reporter.as_ref())?;
        if let Some(data) = self.data.as_mut() {
            data.finish(options, &NoOpReporter)?;
        }
        Ok(())
    }

    /// Fold one worker result into the coordinator's bookkeeping and hand the
    /// image to the data blocks.
    fn absorb(&mut self, output: WorkerOutput, live_discard: bool) -> Result<()> {
        for (total, elapsed) in self.main.times.iter_mut().zip(output.timings.iter()) {
            *total += *elapsed;
        }
        self.main
            .record(output.position, output.discarded_by, live_discard);

        let mut image = output.image;
        if let Some(data) = self.data.as_mut() {
            if image.is_discarded() {
                data.record(output.position, None, live_discard);
            } else {
                data.process(&mut image, live_discard)?;
            }
        }
        Ok(())
    }

    // Queries
    // -------

    pub fn main(&self) -> &Sequence {
        &self.main
    }

    pub fn data(&self) -> Option<&Sequence> {
        self.data.as_ref()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn n_processed_images(&self) -> usize {
        self.main.n_processed_images()
    }

    pub fn processing_time(&self) -> Duration {
        self.main.processing_time()
            + self
                .data
                .as_ref()
                .map(Sequence::processing_time)
                .unwrap_or_default()
    }

    pub fn citations(&self) -> Vec<String> {
        let mut citations = self.main.citations();
        if let Some(data) = &self.data {
            for citation in data.citations() {
                if !citations.contains(&citation) {
                    citations.push(citation);
                }
            }
        }
        citations
    }
}

fn process_in_worker(
    blocks: &mut [Box<dyn Block>],
    input: ImageInput,
    position: usize,
    loader: &dyn ImageLoader,
    telescope: Option<&str>,
    stack: Option<&Image>,
) -> Result<WorkerOutput> {
    let mut image = load_input(input, loader, telescope)?;
    image.set_index(position);
    if let Some(stack) = stack {
        image.inherit_computed(stack);
    }
    let mut timings = vec![Duration::ZERO; blocks.len()];
    let discarded_by = run_image(blocks, &mut image, &mut timings)?;
    Ok(WorkerOutput {
        position,
        image,
        timings,
        discarded_by,
    })
}
