use std::collections::BTreeMap;
use std::ops::Index;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::block::{Block, BlockDescriptor};
use crate::error::{NightfallError, Result};
use crate::image::Image;
use crate::io::loader::{DefaultLoader, ImageLoader};
use crate::io::source::{EmptySource, ImageSource};
use crate::registry::BlockRegistry;

use super::helpers::{default_block_name, join_indices, load_input, run_image};
use super::report::DiscardRecord;
use super::types::{ImageInput, NoOpReporter, ProgressReporter, RunOptions, SequenceStage};

/// Ordered chain of blocks run over a list of images, one image at a time.
///
/// Each image goes through every block in insertion order, mutated in place,
/// until a block discards it or the chain is exhausted. Bookkeeping
/// (`n_processed_images`, discard tally, stack image) is reset by every run;
/// processing times accumulate over the sequence's lifetime.
pub struct Sequence {
    pub(super) name: String,
    pub(super) names: Vec<String>,
    pub(super) blocks: Vec<Box<dyn Block>>,
    pub(super) times: Vec<Duration>,
    pub(super) loader: Arc<dyn ImageLoader>,
    pub(super) source: Arc<dyn ImageSource>,
    pub(super) reporter: Arc<dyn ProgressReporter>,
    pub(super) stack_image: Option<Image>,
    prepared_stack: Option<Image>,
    pub(super) n_processed_images: usize,
    pub(super) discards: BTreeMap<usize, Vec<usize>>,
}

impl Sequence {
    /// Sequence of unnamed blocks (`block0`, `block1`...).
    pub fn new(blocks: Vec<Box<dyn Block>>) -> Self {
        Self::from_named(blocks.into_iter().map(|b| (None, b)).collect())
    }

    /// Sequence of optionally named blocks.
    ///
    /// Unnamed blocks get `block{position}`. When two blocks share a name the
    /// later one replaces the earlier one, keeping the earlier position.
    pub fn from_named(blocks: Vec<(Option<String>, Box<dyn Block>)>) -> Self {
        let mut names: Vec<String> = Vec::with_capacity(blocks.len());
        let mut chain: Vec<Box<dyn Block>> = Vec::with_capacity(blocks.len());
        for (position, (name, block)) in blocks.into_iter().enumerate() {
            let name = name.unwrap_or_else(|| default_block_name(position));
            if let Some(existing) = names.iter().position(|n| *n == name) {
                debug!(name = %name, "Replacing block with duplicate name");
                chain[existing] = block;
            } else {
                names.push(name);
                chain.push(block);
            }
        }
        let times = vec![Duration::ZERO; chain.len()];
        Self {
            name: String::new(),
            names,
            blocks: chain,
            times,
            loader: Arc::new(DefaultLoader),
            source: Arc::new(EmptySource),
            reporter: Arc::new(NoOpReporter),
            stack_image: None,
            prepared_stack: None,
            n_processed_images: 0,
            discards: BTreeMap::new(),
        }
    }

    /// Rebuild a sequence from descriptors, e.g. the output of [`Self::as_descriptors`].
    pub fn from_descriptors(
        descriptors: &[BlockDescriptor],
        registry: &BlockRegistry,
    ) -> Result<Self> {
        let blocks = descriptors
            .iter()
            .map(|d| Ok((d.name.clone(), registry.build(d)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_named(blocks))
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Replace the loader used for path inputs.
    pub fn with_loader(mut self, loader: Arc<dyn ImageLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Source handed to every block's `initialize`, and the stack image
    /// provider when none is attached.
    pub fn with_source(mut self, source: Arc<dyn ImageSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Image processed by stack blocks at the start of every run.
    pub fn with_stack_image(mut self, image: Image) -> Self {
        self.stack_image = Some(image);
        self
    }

    /// Run every input through the chain.
    ///
    /// Fails before touching any block if `inputs` is empty. Any block error
    /// aborts the run.
    pub fn run<I: Into<ImageInput>>(&mut self, inputs: Vec<I>, options: &RunOptions) -> Result<()> {
        let inputs: Vec<ImageInput> = inputs.into_iter().map(Into::into).collect();
        if inputs.is_empty() {
            return Err(NightfallError::EmptySequence);
        }

        let reporter = self.reporter_for(options);
        let total = inputs.len();
        info!(sequence = %self.name, images = total, blocks = self.blocks.len(), "Running sequence");
        self.begin(reporter.as_ref(), options.telescope.as_deref())?;

        reporter.begin_stage(SequenceStage::Processing, Some(total));
        let loader = Arc::clone(&self.loader);
        for (i, input) in inputs.into_iter().enumerate() {
            let mut image = load_input(input, loader.as_ref(), options.telescope.as_deref())?;
            image.set_index(i);
            self.process(&mut image, options.live_discard)?;
            reporter.advance(i + 1);
        }
        reporter.finish_stage();

        self.finish(options, reporter.as_ref())
    }

    pub(super) fn reporter_for(&self, options: &RunOptions) -> Arc<dyn ProgressReporter> {
        if options.show_progress {
            Arc::clone(&self.reporter)
        } else {
            Arc::new(NoOpReporter)
        }
    }

    /// Reset bookkeeping, initialize every block and process the stack image.
    pub(super) fn begin(
        &mut self,
        reporter: &dyn ProgressReporter,
        telescope: Option<&str>,
    ) -> Result<()> {
        self.n_processed_images = 0;
        self.discards.clear();
        self.prepared_stack = None;

        reporter.begin_stage(SequenceStage::Initializing, Some(self.blocks.len()));
        for (k, block) in self.blocks.iter_mut().enumerate() {
            block.initialize(self.source.as_ref())?;
            reporter.advance(k + 1);
        }
        reporter.finish_stage();

        let stack_blocks: Vec<usize> = (0..self.blocks.len())
            .filter(|&k| self.blocks[k].stack())
            .collect();
        if stack_blocks.is_empty() {
            return Ok(());
        }

        let mut stack = match (&self.stack_image, self.source.stack_image()) {
            (Some(image), _) => image.clone(),
            (None, Some(path)) => self.loader.load(&path, telescope)?,
            (None, None) => {
                let kinds: Vec<&str> = stack_blocks.iter().map(|&k| self.blocks[k].kind()).collect();
                return Err(NightfallError::MissingStackImage(kinds.join(", ")));
            }
        };

        reporter.begin_stage(SequenceStage::StackImage, Some(stack_blocks.len()));
        for (done, &k) in stack_blocks.iter().enumerate() {
            let block = &mut self.blocks[k];
            let start = Instant::now();
            let result = block
                .run(&mut stack)
                .and_then(|_| block.stack_method(&mut stack));
            self.times[k] += start.elapsed();
            result?;
            reporter.advance(done + 1);
        }
        reporter.finish_stage();
        info!(blocks = stack_blocks.len(), "Stack image processed");
        self.prepared_stack = Some(stack);
        Ok(())
    }

    /// Send one indexed image through the per-image chain and record the outcome.
    pub(super) fn process(&mut self, image: &mut Image, live_discard: bool) -> Result<()> {
        if let Some(stack) = &self.prepared_stack {
            image.inherit_computed(stack);
        }
        let position = image.index().unwrap_or(self.n_processed_images);
        if image.is_discarded() {
            debug!(image = position, "Image entered the sequence discarded, skipping");
        }
        let discarded_by = run_image(&mut self.blocks, image, &mut self.times)?;
        self.record(position, discarded_by, live_discard);
        Ok(())
    }

    pub(super) fn record(&mut self, position: usize, discarded_by: Option<usize>, live_discard: bool) {
        self.n_processed_images += 1;
        if let Some(k) = discarded_by {
            if live_discard {
                warn!("image {position} discarded in {}", self.blocks[k].kind());
            } else {
                self.discards.entry(k).or_default().push(position);
            }
        }
    }

    /// Terminate blocks (if requested) and emit the batched discard summary.
    pub(super) fn finish(&mut self, options: &RunOptions, reporter: &dyn ProgressReporter) -> Result<()> {
        if options.terminate {
            self.terminate_with(reporter)?;
        }
        if !options.live_discard {
            for record in self.discards() {
                let plural = if record.images.len() > 1 { "s" } else { "" };
                warn!(
                    "{} discarded image{plural} {}",
                    record.kind,
                    join_indices(&record.images)
                );
            }
        }
        info!(
            sequence = %self.name,
            processed = self.n_processed_images,
            seconds = self.processing_time().as_secs_f64(),
            "Sequence complete"
        );
        Ok(())
    }

    /// Call `terminate` on every block.
    pub fn terminate(&mut self) -> Result<()> {
        self.terminate_with(&NoOpReporter)
    }

    fn terminate_with(&mut self, reporter: &dyn ProgressReporter) -> Result<()> {
        reporter.begin_stage(SequenceStage::Terminating, Some(self.blocks.len()));
        for (k, block) in self.blocks.iter_mut().enumerate() {
            block.terminate()?;
            reporter.advance(k + 1);
        }
        reporter.finish_stage();
        Ok(())
    }

    // Queries
    // -------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of images that went through the last run, discarded or not.
    pub fn n_processed_images(&self) -> usize {
        self.n_processed_images
    }

    /// Block names, in execution order.
    pub fn block_names(&self) -> &[String] {
        &self.names
    }

    pub fn block(&self, name: &str) -> Option<&dyn Block> {
        let k = self.names.iter().position(|n| n == name)?;
        Some(self.blocks[k].as_ref())
    }

    pub fn block_mut(&mut self, name: &str) -> Option<&mut Box<dyn Block>> {
        let k = self.names.iter().position(|n| n == name)?;
        Some(&mut self.blocks[k])
    }

    /// Concrete view of the block named `name`.
    pub fn block_as<T: 'static>(&self, name: &str) -> Option<&T> {
        self.block(name)?.as_any().downcast_ref::<T>()
    }

    /// Stack image as left by the stack blocks of the last run.
    pub fn stack_image(&self) -> Option<&Image> {
        self.prepared_stack.as_ref()
    }

    /// Cumulative processing time of a block.
    pub fn block_time(&self, index: usize) -> Option<Duration> {
        self.times.get(index).copied()
    }

    /// Total processing time over all blocks.
    pub fn processing_time(&self) -> Duration {
        self.times.iter().sum()
    }

    /// Deduplicated citations of all blocks, in block order.
    pub fn citations(&self) -> Vec<String> {
        let mut citations: Vec<String> = Vec::new();
        for block in &self.blocks {
            for citation in block.citations().unwrap_or_default() {
                if !citations.contains(&citation) {
                    citations.push(citation);
                }
            }
        }
        citations
    }

    /// Batched discard tally of the last run, in block order. Empty when the
    /// run used live discard reporting.
    pub fn discards(&self) -> Vec<DiscardRecord> {
        self.discards
            .iter()
            .map(|(&k, images)| DiscardRecord {
                block_index: k,
                name: self.names[k].clone(),
                kind: self.blocks[k].kind().to_string(),
                images: images.clone(),
            })
            .collect()
    }

    /// Descriptors reconstructing an equivalent sequence through a registry.
    pub fn as_descriptors(&self) -> Vec<BlockDescriptor> {
        self.names
            .iter()
            .zip(self.blocks.iter())
            .map(|(name, block)| {
                let params = block.params();
                BlockDescriptor {
                    block: block.kind().to_string(),
                    name: Some(name.clone()),
                    args: params.args,
                    kwargs: params.kwargs,
                }
            })
            .collect()
    }
}

impl Index<usize> for Sequence {
    type Output = dyn Block;

    fn index(&self, index: usize) -> &Self::Output {
        self.blocks[index].as_ref()
    }
}
