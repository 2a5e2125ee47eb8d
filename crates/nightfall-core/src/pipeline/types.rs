use std::path::{Path, PathBuf};

use crate::image::Image;

/// Sequence processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceStage {
    Initializing,
    StackImage,
    Processing,
    Terminating,
}

impl std::fmt::Display for SequenceStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => write!(f, "Initializing blocks"),
            Self::StackImage => write!(f, "Processing stack image"),
            Self::Processing => write!(f, "Processing images"),
            Self::Terminating => write!(f, "Terminating blocks"),
        }
    }
}

/// One input of a run: a file to load, or an image already in memory.
#[derive(Clone, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum ImageInput {
    Path(PathBuf),
    Image(Image),
}

impl From<PathBuf> for ImageInput {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for ImageInput {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<&str> for ImageInput {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<Image> for ImageInput {
    fn from(image: Image) -> Self {
        Self::Image(image)
    }
}

/// Per-run switches.
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Drive the sequence's progress reporter.
    pub show_progress: bool,
    /// Warn about every discarded image as it happens instead of one summary
    /// per block at the end of the run.
    pub live_discard: bool,
    /// Call `terminate` on every block once all images are processed.
    pub terminate: bool,
    /// Telescope hint handed to the loader.
    pub telescope: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            show_progress: true,
            live_discard: false,
            terminate: true,
            telescope: None,
        }
    }
}

/// Thread-safe progress reporting for sequences.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items in
    /// this stage (e.g., image count), if known.
    fn begin_stage(&self, _stage: SequenceStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when progress is disabled.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
