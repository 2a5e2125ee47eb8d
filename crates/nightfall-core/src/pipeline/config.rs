use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::block::BlockDescriptor;
use crate::value::Value;

/// A sequence run described in a file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SequenceConfig {
    #[serde(default)]
    pub name: String,
    /// Images to process. When empty, the light frames of `input_dir` are used.
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    /// Folder scanned for light, calibration and stack frames.
    pub input_dir: Option<PathBuf>,
    /// Overrides the telescope named in image headers.
    pub telescope: Option<String>,
    /// Image processed by stack blocks, overriding one found in `input_dir`.
    pub stack_image: Option<PathBuf>,
    #[serde(default)]
    pub blocks: Vec<BlockDescriptor>,
    /// Blocks fed with the images coming out of `blocks`. Required for
    /// accumulating blocks in parallel runs.
    #[serde(default)]
    pub data_blocks: Vec<BlockDescriptor>,
    #[serde(default)]
    pub execution: Execution,
    #[serde(default)]
    pub live_discard: bool,
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

fn default_show_progress() -> bool {
    true
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            name: "reduction".into(),
            inputs: Vec::new(),
            input_dir: Some(PathBuf::from("night")),
            telescope: None,
            stack_image: None,
            blocks: vec![
                BlockDescriptor {
                    block: "Calibration".into(),
                    name: Some("calibration".into()),
                    args: Vec::new(),
                    kwargs: Default::default(),
                },
                BlockDescriptor {
                    block: "SaturationGuard".into(),
                    name: Some("saturation".into()),
                    args: Vec::new(),
                    kwargs: [("threshold".to_string(), Value::Float(60_000.0))].into(),
                },
            ],
            data_blocks: vec![BlockDescriptor {
                block: "MeanStack".into(),
                name: Some("stack".into()),
                args: Vec::new(),
                kwargs: [("output".to_string(), Value::from("stack.fits"))].into(),
            }],
            execution: Execution::default(),
            live_discard: false,
            show_progress: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Execution {
    /// One image at a time on the calling thread.
    #[default]
    Sequential,
    /// Per-image chain on a worker pool, `workers` defaulting to the
    /// available hardware concurrency.
    Parallel { workers: Option<usize> },
}

impl std::fmt::Display for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "Sequential"),
            Self::Parallel { workers: Some(n) } => write!(f, "Parallel ({n} workers)"),
            Self::Parallel { workers: None } => write!(f, "Parallel (auto)"),
        }
    }
}
