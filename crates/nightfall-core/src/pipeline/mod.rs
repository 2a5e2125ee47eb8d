pub mod config;
mod helpers;
mod orchestrator;
mod parallel;
mod report;
mod sequence;
mod types;

pub use config::{Execution, SequenceConfig};
pub use orchestrator::{run_config, RunSummary};
pub use parallel::ParallelSequence;
pub use report::DiscardRecord;
pub use sequence::Sequence;
pub use types::{ImageInput, NoOpReporter, ProgressReporter, RunOptions, SequenceStage};
