use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;

use crate::consts::RESERVED_ATTRIBUTES;
use crate::error::{NightfallError, Result};

/// Anything a block can attach to an image.
///
/// Blanket-implemented for every `Clone + Send + Sync + Debug` type, so blocks
/// never implement it by hand.
pub trait ComputedValue: Any + Send + Sync + fmt::Debug {
    fn clone_value(&self) -> Box<dyn ComputedValue>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Clone + Send + Sync + fmt::Debug> ComputedValue for T {
    fn clone_value(&self) -> Box<dyn ComputedValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Named stage outputs attached to an image during a run.
///
/// Entries are always reached through `**entry`: method lookup on a
/// `&Box<dyn ComputedValue>` would otherwise pick the blanket impl for the
/// reference itself.
#[derive(Default, Debug)]
pub struct Computed {
    entries: BTreeMap<String, Box<dyn ComputedValue>>,
}

impl Computed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `name`, replacing any previous entry.
    pub fn set<T: ComputedValue>(&mut self, name: &str, value: T) -> Result<()> {
        if RESERVED_ATTRIBUTES.contains(&name) {
            return Err(NightfallError::ReservedAttribute(name.to_string()));
        }
        self.entries.insert(name.to_string(), Box::new(value));
        Ok(())
    }

    pub fn get<T: Any>(&self, name: &str) -> Result<&T> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| NightfallError::AttributeNotFound(name.to_string()))?;
        (**entry)
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| NightfallError::AttributeType {
                name: name.to_string(),
                expected: type_name::<T>(),
            })
    }

    pub fn get_mut<T: Any>(&mut self, name: &str) -> Result<&mut T> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| NightfallError::AttributeNotFound(name.to_string()))?;
        (**entry)
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| NightfallError::AttributeType {
                name: name.to_string(),
                expected: type_name::<T>(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy every entry of `other` whose key is not already present.
    pub fn merge_missing(&mut self, other: &Computed) {
        for (name, value) in &other.entries {
            if !self.entries.contains_key(name) {
                self.entries.insert(name.clone(), (**value).clone_value());
            }
        }
    }
}

impl Clone for Computed {
    fn clone(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(name, value)| (name.clone(), (**value).clone_value()))
                .collect(),
        }
    }
}
