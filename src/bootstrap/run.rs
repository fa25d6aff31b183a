//! Command flows behind the `stream` and `pick` subcommands.
//!
//! Output goes to the supplied writer (stdout in the binary) so the flows
//! can be exercised from tests; logs go to stderr.

use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, info_span, warn, Instrument};

use ns_app::RequestDeviceError;
use ns_core::device::DeviceIdentity;
use ns_core::scan::{ScanConfig, ScanKind, ScanOutcome, SelectionError, StartOutcome};
use ns_platform::adapters::PickerState;

use super::wiring::AppRuntime;

/// Per-run overrides for a stream scan
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    pub name_prefix: Option<String>,
    pub allow_duplicates: bool,
    pub timeout_ms: Option<u64>,
    pub service_uuids: Vec<String>,
    pub classic: bool,
}

/// What the scripted user does with the picker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickAction {
    Select(usize),
    Cancel,
    /// Leave the list open until the deadline (or Ctrl+C)
    Wait,
}

#[derive(Debug, Clone)]
pub struct PickOptions {
    pub action: PickAction,
    /// Delay before `action` is applied
    pub after: Duration,
    pub name_prefix: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl Default for PickOptions {
    fn default() -> Self {
        Self {
            action: PickAction::Wait,
            after: Duration::ZERO,
            name_prefix: None,
            timeout_ms: None,
        }
    }
}

fn apply_overrides(
    mut config: ScanConfig,
    name_prefix: Option<String>,
    timeout_ms: Option<u64>,
) -> ScanConfig {
    if let Some(prefix) = name_prefix {
        config = config.with_name_prefix(prefix);
    }
    if let Some(timeout_ms) = timeout_ms {
        config = config.with_deadline(Some(Duration::from_millis(timeout_ms)));
    }
    config
}

/// Run a stream scan, printing one JSON line per forwarded sighting and the
/// final outcome. Ctrl+C stops the scan.
pub async fn run_stream<W: Write>(
    runtime: &AppRuntime,
    options: StreamOptions,
    out: &mut W,
) -> anyhow::Result<ScanOutcome> {
    let mut config = apply_overrides(
        runtime.start_scan.default_config(),
        options.name_prefix,
        options.timeout_ms,
    );
    if options.allow_duplicates {
        config = config.with_deduplicate(false);
    }
    config.criteria.service_uuids = options.service_uuids;
    if options.classic {
        config.criteria.kind = ScanKind::Classic;
    }

    let mut handle = runtime.start_scan.execute(config).await?;
    if handle.start == StartOutcome::Started {
        writeln!(out, "Started scanning")?;
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            sighting = handle.sightings.recv() => match sighting {
                Some(sighting) => writeln!(out, "{}", serde_json::to_string(&sighting)?)?,
                None => break,
            },
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                info!("Interrupted, stopping scan");
                runtime.orchestrator.stop().await;
            }
        }
    }

    let outcome = handle
        .result
        .await
        .context("Scan ended without delivering a result")?;
    writeln!(out, "{}", serde_json::to_string(&outcome)?)?;
    Ok(outcome)
}

/// Run a single-pick scan and apply the scripted user action.
///
/// A rejected action (an index not listed yet, or no pick open yet) is retried
/// on every picker update until it applies or the pick ends. Returns the
/// chosen device, or `None` when the pick ended without one (cancelled, timed
/// out, nothing found).
pub async fn run_pick<W: Write>(
    runtime: &AppRuntime,
    options: PickOptions,
    out: &mut W,
) -> anyhow::Result<Option<DeviceIdentity>> {
    let config = apply_overrides(
        runtime.request_device.default_config(),
        options.name_prefix,
        options.timeout_ms,
    );

    let mut picker_updates = runtime.presentation.subscribe();
    let request = runtime.request_device.execute(config);
    tokio::pin!(request);
    let action_delay = tokio::time::sleep(options.after);
    tokio::pin!(action_delay);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut pending_action = (options.action != PickAction::Wait).then_some(options.action);
    // Last rejection of `pending_action`; set once the first attempt failed.
    let mut rejected: Option<SelectionError> = None;
    let mut interrupted = false;

    let result = loop {
        tokio::select! {
            biased;

            result = &mut request => break result,
            _ = &mut action_delay, if pending_action.is_some() && rejected.is_none() => {
                if let Some(action) = pending_action {
                    match try_action(runtime, action, out).await? {
                        Ok(()) => pending_action = None,
                        Err(err) => rejected = Some(err),
                    }
                }
            }
            changed = picker_updates.changed(), if pending_action.is_some() && rejected.is_some() => {
                match (changed, pending_action) {
                    (Ok(()), Some(action)) => match try_action(runtime, action, out).await? {
                        Ok(()) => {
                            pending_action = None;
                            rejected = None;
                        }
                        Err(err) => rejected = Some(err),
                    },
                    _ => pending_action = None,
                }
            }
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                info!("Interrupted, cancelling selection");
                if let Err(err) = runtime.orchestrator.cancel().await {
                    warn!(error = %err, "Cancel after interrupt rejected");
                }
            }
        }
    };

    if let (Some(action), Some(err)) = (pending_action, rejected) {
        match action {
            PickAction::Select(index) => writeln!(
                out,
                "Selection index {index} never appeared in the device list ({err})"
            )?,
            _ => writeln!(out, "Scripted {action:?} was never applied ({err})")?,
        }
    }

    match result {
        Ok(device) => {
            writeln!(out, "Selected {}", device.label())?;
            Ok(Some(device))
        }
        Err(RequestDeviceError::Scan(failure)) => {
            writeln!(out, "No device selected: {failure}")?;
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// Apply `action` once. The picker is printed only when the action lands, so
/// the printed list is the one the index was resolved against.
async fn try_action<W: Write>(
    runtime: &AppRuntime,
    action: PickAction,
    out: &mut W,
) -> std::io::Result<Result<(), SelectionError>> {
    let picker = runtime.presentation.snapshot();
    let applied = async {
        match action {
            PickAction::Select(index) => runtime.orchestrator.select(index).await,
            PickAction::Cancel => runtime.orchestrator.cancel().await,
            PickAction::Wait => Ok(()),
        }
    }
    .instrument(info_span!("cli.pick.action", ?action))
    .await;

    match &applied {
        Ok(()) => write_picker(out, &picker)?,
        Err(err) => info!(error = %err, "Scripted action not applicable yet, waiting for the picker to change"),
    }
    Ok(applied)
}

fn write_picker<W: Write>(out: &mut W, picker: &PickerState) -> std::io::Result<()> {
    writeln!(out, "{}", picker.title)?;
    for (index, label) in picker.labels.iter().enumerate() {
        writeln!(out, "  {index}: {label}")?;
    }
    Ok(())
}
