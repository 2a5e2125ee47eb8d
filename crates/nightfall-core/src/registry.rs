use std::collections::BTreeMap;

use crate::block::{Block, BlockDescriptor, BlockParams};
use crate::blocks;
use crate::error::{NightfallError, Result};

/// Builds a block from its construction parameters.
pub type BlockConstructor = fn(&BlockParams) -> Result<Box<dyn Block>>;

/// Maps block type names to constructors, so sequences can be rebuilt from
/// descriptors (config files, saved runs).
#[derive(Clone, Default)]
pub struct BlockRegistry {
    constructors: BTreeMap<String, BlockConstructor>,
}

impl BlockRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry knowing every block shipped with this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(blocks::Calibration::KIND, blocks::Calibration::from_params);
        registry.register(blocks::Trim::KIND, blocks::Trim::from_params);
        registry.register(blocks::SaturationGuard::KIND, blocks::SaturationGuard::from_params);
        registry.register(blocks::Cutouts::KIND, blocks::Cutouts::from_params);
        registry.register(blocks::MeanStack::KIND, blocks::MeanStack::from_params);
        registry.register(blocks::LightCurve::KIND, blocks::LightCurve::from_params);
        registry
    }

    /// Register (or replace) the constructor for `kind`.
    pub fn register(&mut self, kind: &str, constructor: BlockConstructor) {
        self.constructors.insert(kind.to_string(), constructor);
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn build(&self, descriptor: &BlockDescriptor) -> Result<Box<dyn Block>> {
        let constructor = self
            .constructors
            .get(&descriptor.block)
            .ok_or_else(|| NightfallError::UnknownBlock(descriptor.block.clone()))?;
        constructor(&descriptor.params())
    }
}
