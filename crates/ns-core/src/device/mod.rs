//! Device domain models.

pub mod identity;
pub mod registry;
pub mod sighting;

pub use identity::{DeviceAddress, DeviceIdentity};
pub use registry::{DeviceRegistry, RegistryError};
pub use sighting::{RawSighting, Sighting, SightingMetadata};
