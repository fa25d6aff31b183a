//! # Configuration Loader / 配置加载器
//!
//! ## Responsibilities / 职责
//!
//! - ✅ Locate the configuration file / 定位配置文件
//! - ✅ Parse TOML into AppConfig DTO / 将 TOML 解析为 AppConfig DTO
//! - ✅ Report I/O and parsing errors with context / 报告带上下文的 I/O 和解析错误
//!
//! Missing keys fall back to the settings defaults. Request validation
//! happens when a scan starts, not here.

use std::path::{Path, PathBuf};

use anyhow::Context;
use ns_core::config::AppConfig;

/// Environment variable consulted when no `--config` flag is given
pub const CONFIG_ENV_VAR: &str = "NEARSCAN_CONFIG";

/// Load configuration from a TOML file
/// 从 TOML 文件加载配置
///
/// # Errors / 错误
///
/// Returns error if the file cannot be read or is not valid TOML for
/// [`AppConfig`].
pub fn load_config(config_path: &Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
    AppConfig::from_toml_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
}

/// Pick the config path: explicit flag first, then [`CONFIG_ENV_VAR`].
pub fn config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        std::env::var_os(CONFIG_ENV_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    })
}

/// Resolve and load the configuration, or use built-in defaults when no
/// file is configured.
pub fn resolve_config(explicit: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    match config_path(explicit) {
        Some(path) => load_config(&path),
        None => Ok(AppConfig::default()),
    }
}
