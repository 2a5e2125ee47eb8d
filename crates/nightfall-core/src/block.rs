use std::any::Any;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{NightfallError, Result};
use crate::image::Image;
use crate::io::source::ImageSource;
use crate::value::Value;

/// A stage of a sequence.
///
/// Only `run` is required. Every other hook defaults to a no-op so a block
/// implements exactly the capabilities it needs.
///
/// Blocks never report values back: everything they produce is written into
/// the image (`data`, `metadata`, `sources` or the computed store). Calling
/// [`Image::discard`] stops the image from reaching any later block.
pub trait Block: BlockClone + Send + Sync {
    /// Type name used in reports and descriptors.
    fn kind(&self) -> &'static str;

    /// Parameters needed to rebuild an equivalent block through a [`crate::registry::BlockRegistry`].
    fn params(&self) -> BlockParams {
        BlockParams::default()
    }

    /// `true` if the block runs once on the stack image instead of on every image.
    fn stack(&self) -> bool {
        false
    }

    /// `true` for blocks that accumulate state across images (tables, running
    /// stacks). Such blocks cannot live in the per-image chain of a parallel
    /// sequence, where each worker only sees a private copy of the block.
    fn is_data_block(&self) -> bool {
        false
    }

    /// One-time setup, called before any image is processed.
    fn initialize(&mut self, _source: &dyn ImageSource) -> Result<()> {
        Ok(())
    }

    fn run(&mut self, image: &mut Image) -> Result<()>;

    /// Extra processing on the stack image, right after `run`.
    fn stack_method(&mut self, _image: &mut Image) -> Result<()> {
        Ok(())
    }

    /// Called once after every image went through the sequence.
    fn terminate(&mut self) -> Result<()> {
        Ok(())
    }

    fn citations(&self) -> Option<Vec<String>> {
        None
    }
}

/// Object-safe cloning and downcasting for boxed blocks.
pub trait BlockClone {
    fn clone_block(&self) -> Box<dyn Block>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Block + Clone + 'static> BlockClone for T {
    fn clone_block(&self) -> Box<dyn Block> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Construction arguments of a block, positional and named.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockParams {
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: BTreeMap<String, Value>,
}

impl BlockParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }

    pub fn f64_or(&self, block: &str, name: &str, default: f64) -> Result<f64> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v
                .as_f64()
                .ok_or_else(|| invalid(block, name, format!("expected a number, got {v}"))),
        }
    }

    pub fn usize_or(&self, block: &str, name: &str, default: usize) -> Result<usize> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v
                .as_i64()
                .filter(|n| *n >= 0)
                .map(|n| n as usize)
                .ok_or_else(|| invalid(block, name, format!("expected a count, got {v}"))),
        }
    }

    pub fn bool_or(&self, block: &str, name: &str, default: bool) -> Result<bool> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v
                .as_bool()
                .ok_or_else(|| invalid(block, name, format!("expected a boolean, got {v}"))),
        }
    }

    pub fn string(&self, block: &str, name: &str) -> Result<Option<String>> {
        match self.get(name) {
            None => Ok(None),
            Some(v) => v
                .as_str()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| invalid(block, name, format!("expected a string, got {v}"))),
        }
    }

    pub fn strings(&self, block: &str, name: &str) -> Result<Vec<String>> {
        match self.get(name) {
            None => Ok(Vec::new()),
            Some(Value::List(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| invalid(block, name, format!("expected strings, got {item}")))
                })
                .collect(),
            Some(v) => Err(invalid(block, name, format!("expected a list, got {v}"))),
        }
    }
}

fn invalid(block: &str, param: &str, reason: String) -> NightfallError {
    NightfallError::InvalidParameter {
        block: block.to_string(),
        param: param.to_string(),
        reason,
    }
}

/// Serializable description of one block of a sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockDescriptor {
    /// Block type, as returned by [`Block::kind`].
    pub block: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: BTreeMap<String, Value>,
}

impl BlockDescriptor {
    pub fn params(&self) -> BlockParams {
        BlockParams {
            args: self.args.clone(),
            kwargs: self.kwargs.clone(),
        }
    }
}
