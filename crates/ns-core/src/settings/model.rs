use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::scan::ScanMode;

/// Texts shown by the device picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayStrings {
    /// 扫描进行中的标题
    pub scanning: String,
    /// 取消按钮
    pub cancel: String,
    /// 扫描结束且列表非空时的标题
    pub available_devices: String,
    /// 扫描结束且没有发现设备时的标题
    pub no_device_found: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Scan deadline in milliseconds; `None` scans until stopped
    pub scan_timeout_ms: Option<u64>,
    pub deduplicate: bool,
    /// Case-sensitive prefix; empty accepts every device
    pub name_prefix: String,
    pub scan_mode: ScanMode,
    pub display: DisplayStrings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log directory; `None` means the platform data directory
    pub directory: Option<PathBuf>,
    /// Write a daily rolling log file in addition to stderr
    pub file: bool,
}
