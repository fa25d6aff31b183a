//! Replay scan source
//! 回放扫描源
//!
//! Plays back a recorded list of advertisements as if a radio reported them.
//! A script is a JSON array; each entry waits `delay_ms` after the previous
//! one and is either a sighting, an end-of-scan marker or a failure:
//!
//! ```json
//! [
//!   { "delay_ms": 100, "address": "C4:7C:8D:6A:12:01", "name": "BleThermo", "rssi": -61 },
//!   { "delay_ms": 250, "address": "F0:99:B6:00:00:02" },
//!   { "delay_ms": 500, "finished": true }
//! ]
//! ```

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ns_core::device::{DeviceIdentity, RawSighting, SightingMetadata};
use ns_core::ports::{ScanEventSender, ScanSourceError, ScanSourceEvent, ScanSourcePort};
use ns_core::scan::{ScanCriteria, ScanKind};

/// Suffix of the Bluetooth base UUID used to expand 16/32-bit short forms
const BLUETOOTH_BASE_SUFFIX: &str = "-0000-1000-8000-00805f9b34fb";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplayStep {
    Sighting {
        #[serde(default)]
        delay_ms: u64,
        address: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        rssi: Option<i16>,
        #[serde(default)]
        tx_power: Option<i16>,
        #[serde(default)]
        service_uuids: Vec<String>,
        #[serde(default)]
        device_class: Option<u32>,
    },
    Finished {
        #[serde(default)]
        delay_ms: u64,
        finished: bool,
    },
    Failed {
        #[serde(default)]
        delay_ms: u64,
        error: String,
    },
}

impl ReplayStep {
    pub fn delay(&self) -> Duration {
        let delay_ms = match self {
            ReplayStep::Sighting { delay_ms, .. }
            | ReplayStep::Finished { delay_ms, .. }
            | ReplayStep::Failed { delay_ms, .. } => *delay_ms,
        };
        Duration::from_millis(delay_ms)
    }

    fn into_event(self) -> Option<ScanSourceEvent> {
        match self {
            ReplayStep::Sighting {
                address,
                name,
                rssi,
                tx_power,
                service_uuids,
                device_class,
                ..
            } => Some(ScanSourceEvent::Sighting(RawSighting::new(
                DeviceIdentity::new(address, name),
                SightingMetadata {
                    rssi,
                    tx_power,
                    service_uuids,
                    device_class,
                    ..SightingMetadata::default()
                },
            ))),
            ReplayStep::Finished { finished: true, .. } => Some(ScanSourceEvent::Finished),
            ReplayStep::Finished { finished: false, .. } => None,
            ReplayStep::Failed { error, .. } => Some(ScanSourceEvent::Failed(error)),
        }
    }
}

/// Parsed replay script
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayScript {
    steps: Vec<ReplayStep>,
}

impl ReplayScript {
    pub fn new(steps: Vec<ReplayStep>) -> Self {
        Self { steps }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let steps: Vec<ReplayStep> =
            serde_json::from_str(content).context("Failed to parse replay script")?;
        Ok(Self { steps })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay script: {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("Invalid replay script: {}", path.display()))
    }

    pub fn steps(&self) -> &[ReplayStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// [`ScanSourcePort`] backed by a [`ReplayScript`].
///
/// Each `start_scanning` plays the script from the beginning on its own task;
/// `stop_scanning` aborts it. Sightings that do not advertise one of the
/// requested service UUIDs are dropped, the way a radio-level scan filter
/// would.
pub struct ReplayScanSource {
    script: Arc<ReplayScript>,
    running: Mutex<Option<AbortHandle>>,
}

impl ReplayScanSource {
    pub fn new(script: ReplayScript) -> Self {
        Self {
            script: Arc::new(script),
            running: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|running| running.as_ref().is_some_and(|task| !task.is_finished()))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ScanSourcePort for ReplayScanSource {
    async fn start_scanning(
        &self,
        criteria: ScanCriteria,
        events: ScanEventSender,
    ) -> Result<(), ScanSourceError> {
        let mut running = self
            .running
            .lock()
            .map_err(|_| ScanSourceError::Other("replay state lock poisoned".to_string()))?;
        if running.as_ref().is_some_and(|task| !task.is_finished()) {
            return Err(ScanSourceError::Busy);
        }

        let filter = ServiceFilter::new(&criteria);
        let script = Arc::clone(&self.script);
        info!(
            steps = script.len(),
            kind = ?criteria.kind,
            scan_mode = ?criteria.scan_mode,
            "Replay scan started"
        );

        let task = tokio::spawn(async move {
            for step in script.steps().iter().cloned() {
                tokio::time::sleep(step.delay()).await;
                let Some(event) = step.into_event() else {
                    continue;
                };
                if let ScanSourceEvent::Sighting(raw) = &event {
                    if !filter.accepts(&raw.metadata) {
                        debug!(address = %raw.device.address, "Sighting dropped by service filter");
                        continue;
                    }
                }
                let terminal = !matches!(event, ScanSourceEvent::Sighting(_));
                if events.send(event).is_err() {
                    debug!("Scan event receiver closed, ending replay");
                    return;
                }
                if terminal {
                    return;
                }
            }
            // Classic inquiry ends on its own; LE scans run until stopped
            if filter.kind == ScanKind::Classic {
                let _ = events.send(ScanSourceEvent::Finished);
            }
        });
        *running = Some(task.abort_handle());
        Ok(())
    }

    async fn stop_scanning(&self) -> Result<(), ScanSourceError> {
        let task = self
            .running
            .lock()
            .map_err(|_| ScanSourceError::Other("replay state lock poisoned".to_string()))?
            .take();
        match task {
            Some(task) => {
                task.abort();
                info!("Replay scan stopped");
            }
            None => warn!("Stop requested but replay scan is not running"),
        }
        Ok(())
    }
}

struct ServiceFilter {
    kind: ScanKind,
    services: Vec<Uuid>,
}

impl ServiceFilter {
    fn new(criteria: &ScanCriteria) -> Self {
        let services = criteria
            .service_uuids
            .iter()
            .filter_map(|value| match parse_service_uuid(value) {
                Some(uuid) => Some(uuid),
                None => {
                    warn!(uuid = %value, "Ignoring malformed service UUID in scan filter");
                    None
                }
            })
            .collect();
        Self {
            kind: criteria.kind,
            services,
        }
    }

    /// Any requested service present in the advertisement passes.
    fn accepts(&self, metadata: &SightingMetadata) -> bool {
        if self.services.is_empty() {
            return true;
        }
        metadata
            .service_uuids
            .iter()
            .filter_map(|value| parse_service_uuid(value))
            .any(|uuid| self.services.contains(&uuid))
    }
}

/// Accepts full UUIDs and 16/32-bit short forms (`180d`, `0x180D`, `0000180d`).
fn parse_service_uuid(input: &str) -> Option<Uuid> {
    let trimmed = input.trim().trim_start_matches("0x");
    let normalized = match trimmed.len() {
        4 => format!("0000{trimmed}{BLUETOOTH_BASE_SUFFIX}"),
        8 => format!("{trimmed}{BLUETOOTH_BASE_SUFFIX}"),
        _ => trimmed.to_string(),
    };
    Uuid::parse_str(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ns_core::ports::scan_event_channel;
    use std::io::Write;

    fn sighting(delay_ms: u64, address: &str, services: &[&str]) -> ReplayStep {
        ReplayStep::Sighting {
            delay_ms,
            address: address.to_string(),
            name: None,
            rssi: None,
            tx_power: None,
            service_uuids: services.iter().map(|s| s.to_string()).collect(),
            device_class: None,
        }
    }

    #[test]
    fn test_script_parses_all_step_kinds() {
        let script = ReplayScript::from_json_str(
            r#"[
                {"delay_ms": 10, "address": "AA", "name": "Tag", "rssi": -40},
                {"address": "BB"},
                {"delay_ms": 5, "finished": true},
                {"error": "adapter reset"}
            ]"#,
        )
        .unwrap();

        assert_eq!(script.len(), 4);
        assert!(matches!(
            &script.steps()[0],
            ReplayStep::Sighting { name: Some(name), rssi: Some(-40), .. } if name == "Tag"
        ));
        assert_eq!(script.steps()[1].delay(), Duration::ZERO);
        assert!(matches!(script.steps()[2], ReplayStep::Finished { finished: true, .. }));
        assert!(matches!(&script.steps()[3], ReplayStep::Failed { error, .. } if error == "adapter reset"));
    }

    #[test]
    fn test_script_rejects_unknown_shape() {
        assert!(ReplayScript::from_json_str(r#"[{"delay_ms": 1}]"#).is_err());
        assert!(ReplayScript::from_json_str("not json").is_err());
    }

    #[test]
    fn test_load_reads_script_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"delay_ms": 20, "address": "AA", "service_uuids": ["180d"]}}, {{"finished": true}}]"#
        )
        .unwrap();

        let script = ReplayScript::load(file.path()).unwrap();

        assert_eq!(script.len(), 2);
        assert_eq!(script.steps()[0].delay(), Duration::from_millis(20));
    }

    #[test]
    fn test_load_reports_missing_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        let err = ReplayScript::load(&missing).unwrap_err();
        assert!(err.to_string().contains("Failed to read replay script"));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"address": "AA"}}"#).unwrap();
        let err = ReplayScript::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid replay script"));
    }

    #[test]
    fn test_short_service_uuid_expands_to_base_uuid() {
        assert_eq!(
            parse_service_uuid("0x180D"),
            Uuid::parse_str("0000180d-0000-1000-8000-00805f9b34fb").ok()
        );
        assert_eq!(parse_service_uuid("180d"), parse_service_uuid("0000180d"));
        assert_eq!(parse_service_uuid("nope"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_emits_events_until_finished() {
        let source = ReplayScanSource::new(ReplayScript::new(vec![
            sighting(100, "AA", &[]),
            ReplayStep::Finished {
                delay_ms: 100,
                finished: true,
            },
            sighting(100, "never", &[]),
        ]));
        let (tx, mut rx) = scan_event_channel();

        source.start_scanning(ScanCriteria::default(), tx).await.unwrap();

        assert!(matches!(rx.recv().await, Some(ScanSourceEvent::Sighting(raw)) if raw.device.address.as_str() == "AA"));
        assert_eq!(rx.recv().await, Some(ScanSourceEvent::Finished));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_filter_drops_unmatched_sightings() {
        let source = ReplayScanSource::new(ReplayScript::new(vec![
            sighting(0, "HR", &["180d"]),
            sighting(0, "BAT", &["0000180f-0000-1000-8000-00805f9b34fb"]),
            sighting(0, "NONE", &[]),
        ]));
        let (tx, mut rx) = scan_event_channel();
        let criteria = ScanCriteria {
            service_uuids: vec!["0x180D".to_string()],
            ..ScanCriteria::default()
        };

        source.start_scanning(criteria, tx).await.unwrap();

        let mut addresses = Vec::new();
        while let Some(ScanSourceEvent::Sighting(raw)) = rx.recv().await {
            addresses.push(raw.device.address.into_inner());
        }
        assert_eq!(addresses, vec!["HR".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_classic_replay_reports_finish_at_end_of_script() {
        let source = ReplayScanSource::new(ReplayScript::new(vec![sighting(10, "AA", &[])]));
        let (tx, mut rx) = scan_event_channel();
        let criteria = ScanCriteria {
            kind: ScanKind::Classic,
            ..ScanCriteria::default()
        };

        source.start_scanning(criteria, tx).await.unwrap();

        assert!(matches!(rx.recv().await, Some(ScanSourceEvent::Sighting(_))));
        assert_eq!(rx.recv().await, Some(ScanSourceEvent::Finished));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_while_running_is_busy() {
        let source = ReplayScanSource::new(ReplayScript::new(vec![sighting(1_000, "AA", &[])]));
        let (tx, _rx) = scan_event_channel();
        source.start_scanning(ScanCriteria::default(), tx.clone()).await.unwrap();

        let err = source
            .start_scanning(ScanCriteria::default(), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanSourceError::Busy));

        source.stop_scanning().await.unwrap();
        tokio::task::yield_now().await;
        assert!(!source.is_running());
    }
}
