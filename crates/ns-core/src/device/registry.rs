//! Insertion-ordered set of device identities seen during one session.

use std::collections::HashSet;

use thiserror::Error;

use super::identity::{DeviceAddress, DeviceIdentity};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("index {index} out of range (registry holds {count} devices)")]
    IndexOutOfRange { index: usize, count: usize },
}

/// Deduplication set with positional lookup.
///
/// Position is first-seen order. An address is stored at most once, and the
/// identity recorded on first sight is kept even if later sightings carry a
/// different name.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    order: Vec<DeviceIdentity>,
    seen: HashSet<DeviceAddress>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }

    /// Returns `true` the first time an address is seen.
    pub fn add_device(&mut self, identity: DeviceIdentity) -> bool {
        if !self.seen.insert(identity.address.clone()) {
            return false;
        }
        self.order.push(identity);
        true
    }

    pub fn count(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get_by_index(&self, index: usize) -> Result<&DeviceIdentity, RegistryError> {
        self.order.get(index).ok_or(RegistryError::IndexOutOfRange {
            index,
            count: self.order.len(),
        })
    }

    /// Ordered copy for presentation layers.
    pub fn snapshot(&self) -> Vec<DeviceIdentity> {
        self.order.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceIdentity> {
        self.order.iter()
    }
}
