//! Tracing configuration for nearscan
//!
//! ## Architecture / 架构
//!
//! - **stderr layer**: always on, so stdout stays reserved for command output
//! - **file layer**: daily rolling file when `[logging] file = true`
//! - **Environment-aware**: `RUST_LOG` overrides the built-in directives

use std::{fs, io, path::PathBuf, sync::OnceLock};

use anyhow::Context;
use ns_core::settings::LoggingSettings;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, fmt::writer::BoxMakeWriter, prelude::*, registry};

const APP_DIR_NAME: &str = "nearscan";
const LOG_FILE_PREFIX: &str = "nearscan.log";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Check if running in development environment
fn is_development() -> bool {
    cfg!(debug_assertions)
}

/// Build the default filter directives for tracing
///
/// ## Behavior / 行为
/// - **Development**: debug level for nearscan crates
/// - **Production**: info level everywhere
fn build_filter_directives(is_dev: bool) -> Vec<String> {
    let crate_level = if is_dev { "debug" } else { "info" };
    vec![
        "info".to_string(),
        format!("nearscan={crate_level}"),
        format!("nearscan_lib={crate_level}"),
        format!("ns_core={crate_level}"),
        format!("ns_app={crate_level}"),
        format!("ns_platform={crate_level}"),
    ]
}

/// Directory for log files: the configured one, else
/// `<data_local_dir>/nearscan/logs`.
pub fn resolve_log_dir(settings: &LoggingSettings) -> Option<PathBuf> {
    settings
        .directory
        .clone()
        .or_else(|| dirs::data_local_dir().map(|base| base.join(APP_DIR_NAME).join("logs")))
}

/// Initialize the tracing subscriber
///
/// 1. Creates an env-filter for level control
/// 2. Sets up the stderr fmt layer (`2025-01-15 10:30:45.123 INFO file.rs:42 target: message`)
/// 3. Adds the rolling file layer if enabled and the directory is usable
/// 4. Registers the global subscriber
///
/// ## Errors / 错误
///
/// Returns `Err` if a subscriber is already registered.
pub fn init_tracing_subscriber(settings: &LoggingSettings) -> anyhow::Result<()> {
    let filter_directives = build_filter_directives(is_development());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter_directives.join(",")));

    let stderr_writer: BoxMakeWriter = BoxMakeWriter::new(io::stderr);
    let file_writer = if settings.file {
        match resolve_log_dir(settings).context("No data directory available for log files") {
            Ok(dir) => match build_file_writer(dir) {
                Ok(writer) => Some(writer),
                Err(err) => {
                    eprintln!("Failed to initialize file logging, continuing with stderr only: {err:#}");
                    None
                }
            },
            Err(err) => {
                eprintln!("{err}");
                None
            }
        }
    } else {
        None
    };

    let stderr_layer = fmt::layer()
        .with_timer(fmt::time::ChronoUtc::new(TIMESTAMP_FORMAT.to_string()))
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_ansi(cfg!(not(test)))
        .with_writer(stderr_writer);

    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_timer(fmt::time::ChronoUtc::new(TIMESTAMP_FORMAT.to_string()))
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
    });

    registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}

fn build_file_writer(dir: PathBuf) -> anyhow::Result<NonBlocking> {
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    LOG_GUARD
        .set(guard)
        .map_err(|_| anyhow::anyhow!("Tracing log guard already initialized"))?;

    Ok(non_blocking)
}
