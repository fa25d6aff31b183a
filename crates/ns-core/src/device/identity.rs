use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Label used for devices that advertise no name.
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown";

/// Opaque, stable identifier of a peripheral (usually a MAC-like address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for DeviceAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DeviceAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A discovered peripheral.
///
/// Identity is the address alone: two values with the same address and
/// different names compare equal. The name is descriptive only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub address: DeviceAddress,
    pub name: Option<String>,
}

impl DeviceIdentity {
    pub fn new(address: impl Into<DeviceAddress>, name: Option<String>) -> Self {
        Self {
            address: address.into(),
            name,
        }
    }

    /// Name for display, falling back to [`UNKNOWN_DEVICE_NAME`].
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN_DEVICE_NAME)
    }

    /// List entry text: `[<address>] <name>`.
    pub fn label(&self) -> String {
        format!("[{}] {}", self.address, self.display_name())
    }

    /// Case-sensitive name prefix match. An empty prefix accepts everything,
    /// including unnamed devices.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            return true;
        }
        self.name
            .as_deref()
            .is_some_and(|name| name.starts_with(prefix))
    }
}

impl PartialEq for DeviceIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for DeviceIdentity {}

impl Hash for DeviceIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}
