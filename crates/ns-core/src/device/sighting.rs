use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::DeviceIdentity;

/// Platform data attached to a sighting. The core never inspects it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SightingMetadata {
    #[serde(default)]
    pub rssi: Option<i16>,
    #[serde(default)]
    pub tx_power: Option<i16>,
    #[serde(default)]
    pub service_uuids: Vec<String>,
    #[serde(default)]
    pub manufacturer_data: BTreeMap<u16, Vec<u8>>,
    #[serde(default)]
    pub service_data: BTreeMap<String, Vec<u8>>,
    /// Classic (BR/EDR) class of device, when reported
    #[serde(default)]
    pub device_class: Option<u32>,
}

/// A detection as reported by a scan source, before the session stamps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSighting {
    pub device: DeviceIdentity,
    pub metadata: SightingMetadata,
}

impl RawSighting {
    pub fn new(device: DeviceIdentity, metadata: SightingMetadata) -> Self {
        Self { device, metadata }
    }
}

/// One observation of a device during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sighting {
    pub device: DeviceIdentity,
    pub seen_at: DateTime<Utc>,
    /// Position of the raw event within its session, starting at 0
    pub sequence: u64,
    pub metadata: SightingMetadata,
}

impl Sighting {
    pub fn from_raw(raw: RawSighting, sequence: u64, seen_at: DateTime<Utc>) -> Self {
        Self {
            device: raw.device,
            seen_at,
            sequence,
            metadata: raw.metadata,
        }
    }
}
