//! # Application configuration / 应用配置
//!
//! Pure data: TOML → DTO mapping. Missing sections fall back to the
//! `Default` impls in [`crate::settings::defaults`]; nothing here validates.

use serde::{Deserialize, Serialize};

use crate::settings::{DiscoverySettings, LoggingSettings};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub discovery: DiscoverySettings,
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Parse configuration from TOML text
    /// 从 TOML 文本解析配置
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }
}
