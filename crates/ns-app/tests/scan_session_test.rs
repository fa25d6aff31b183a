use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use ns_app::ScanOrchestrator;
use ns_core::device::{DeviceIdentity, RawSighting, SightingMetadata};
use ns_core::ports::{
    PresentationPort, ScanEventSender, ScanSourceError, ScanSourceEvent, ScanSourcePort,
};
use ns_core::scan::{
    ListStatus, ResultMode, ScanConfig, ScanCriteria, ScanFailure, ScanKind, ScanOutcome,
    ScanState, SelectionError, StartOutcome,
};
use ns_core::settings::DisplayStrings;

mock! {
    pub Source {}

    #[async_trait]
    impl ScanSourcePort for Source {
        async fn start_scanning(
            &self,
            criteria: ScanCriteria,
            events: ScanEventSender,
        ) -> Result<(), ScanSourceError>;
        async fn stop_scanning(&self) -> Result<(), ScanSourceError>;
    }
}

/// Scan source driven by the test body.
#[derive(Default)]
struct ScriptedSource {
    sender: Mutex<Option<ScanEventSender>>,
    criteria: Mutex<Vec<ScanCriteria>>,
    stop_calls: Mutex<usize>,
}

impl ScriptedSource {
    fn emit(&self, address: &str, name: Option<&str>) {
        self.push(ScanSourceEvent::Sighting(RawSighting::new(
            DeviceIdentity::new(address, name.map(str::to_string)),
            SightingMetadata::default(),
        )));
    }

    fn push(&self, event: ScanSourceEvent) {
        let sender = self.sender.lock().unwrap();
        let sender = sender.as_ref().expect("source not started");
        let _ = sender.send(event);
    }

    fn start_calls(&self) -> usize {
        self.criteria.lock().unwrap().len()
    }

    fn stop_calls(&self) -> usize {
        *self.stop_calls.lock().unwrap()
    }
}

#[async_trait]
impl ScanSourcePort for ScriptedSource {
    async fn start_scanning(
        &self,
        criteria: ScanCriteria,
        events: ScanEventSender,
    ) -> Result<(), ScanSourceError> {
        self.criteria.lock().unwrap().push(criteria);
        *self.sender.lock().unwrap() = Some(events);
        Ok(())
    }

    async fn stop_scanning(&self) -> Result<(), ScanSourceError> {
        *self.stop_calls.lock().unwrap() += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum UiCall {
    List(Vec<String>),
    Status(ListStatus, String),
    Dismissed,
}

#[derive(Default)]
struct RecordingPresentation {
    calls: Mutex<Vec<UiCall>>,
}

impl RecordingPresentation {
    fn calls(&self) -> Vec<UiCall> {
        self.calls.lock().unwrap().clone()
    }

    fn last_list(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .rev()
            .find_map(|call| match call {
                UiCall::List(labels) => Some(labels),
                _ => None,
            })
            .unwrap_or_default()
    }
}

impl PresentationPort for RecordingPresentation {
    fn list_updated(&self, devices: &[DeviceIdentity]) {
        let labels = devices.iter().map(DeviceIdentity::label).collect();
        self.calls.lock().unwrap().push(UiCall::List(labels));
    }

    fn status_changed(&self, status: ListStatus, strings: &DisplayStrings) {
        self.calls
            .lock()
            .unwrap()
            .push(UiCall::Status(status, status.title(strings).to_string()));
    }

    fn dismissed(&self) {
        self.calls.lock().unwrap().push(UiCall::Dismissed);
    }
}

struct Harness {
    source: Arc<ScriptedSource>,
    presentation: Arc<RecordingPresentation>,
    orchestrator: ScanOrchestrator,
}

fn harness() -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("ns_app=debug,ns_core=debug")
        .with_test_writer()
        .try_init();

    let source = Arc::new(ScriptedSource::default());
    let presentation = Arc::new(RecordingPresentation::default());
    let orchestrator = ScanOrchestrator::new(
        source.clone(),
        presentation.clone(),
        DisplayStrings::default(),
    );
    Harness {
        source,
        presentation,
        orchestrator,
    }
}

/// Let the forwarder and driver tasks drain pending events.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

async fn drain_addresses(
    sightings: &mut tokio::sync::mpsc::UnboundedReceiver<ns_core::Sighting>,
) -> Vec<String> {
    let mut addresses = Vec::new();
    while let Some(sighting) = sightings.recv().await {
        addresses.push(sighting.device.address.into_inner());
    }
    addresses
}

#[tokio::test(start_paused = true)]
async fn stream_scan_reports_each_device_once_when_deduplicating() {
    let h = harness();
    let mut handle = h
        .orchestrator
        .start(ScanConfig::new(ResultMode::Stream).with_deadline(Some(Duration::from_secs(10))))
        .await
        .unwrap();
    assert_eq!(handle.start, StartOutcome::Started);

    for _ in 0..5 {
        h.source.emit("AA:AA", Some("Sensor"));
    }
    h.source.emit("BB:BB", Some("Tag"));

    assert_eq!(drain_addresses(&mut handle.sightings).await, vec!["AA:AA", "BB:BB"]);
    assert_eq!(handle.result.await.unwrap(), ScanOutcome::completed());
}

#[tokio::test(start_paused = true)]
async fn stream_scan_without_dedup_reports_every_sighting() {
    let h = harness();
    let mut handle = h
        .orchestrator
        .start(
            ScanConfig::new(ResultMode::Stream)
                .with_deduplicate(false)
                .with_deadline(Some(Duration::from_secs(10))),
        )
        .await
        .unwrap();

    for _ in 0..5 {
        h.source.emit("AA:AA", Some("Sensor"));
    }

    assert_eq!(drain_addresses(&mut handle.sightings).await.len(), 5);
    assert_eq!(h.orchestrator.state().await, None);
}

#[tokio::test(start_paused = true)]
async fn sightings_carry_increasing_sequence_numbers() {
    let h = harness();
    let mut handle = h
        .orchestrator
        .start(ScanConfig::new(ResultMode::Stream).with_deduplicate(false))
        .await
        .unwrap();

    h.source.emit("AA", None);
    h.source.emit("BB", None);
    settle().await;
    h.orchestrator.stop().await;

    let first = handle.sightings.recv().await.unwrap();
    let second = handle.sightings.recv().await.unwrap();
    assert!(first.sequence < second.sequence);
    assert!(first.seen_at <= second.seen_at);
}

#[tokio::test(start_paused = true)]
async fn name_prefix_filters_sightings() {
    let h = harness();
    let mut handle = h
        .orchestrator
        .start(ScanConfig::new(ResultMode::Stream).with_name_prefix("Ble"))
        .await
        .unwrap();

    h.source.emit("01", Some("BleThermo"));
    h.source.emit("02", Some("Phone"));
    h.source.emit("03", None);
    h.source.emit("04", Some("ble lower"));
    settle().await;

    assert_eq!(
        h.orchestrator.devices().await,
        vec![DeviceIdentity::new("01", None)]
    );
    h.orchestrator.stop().await;
    assert_eq!(drain_addresses(&mut handle.sightings).await, vec!["01"]);
}

#[tokio::test(start_paused = true)]
async fn stopping_twice_delivers_one_result() {
    let h = harness();
    let mut handle = h
        .orchestrator
        .start(ScanConfig::new(ResultMode::Stream))
        .await
        .unwrap();

    h.orchestrator.stop().await;
    h.orchestrator.stop().await;

    assert_eq!(
        (&mut handle.result).await.unwrap(),
        ScanOutcome::completed()
    );
    assert!(handle.sightings.recv().await.is_none());
    assert_eq!(h.source.stop_calls(), 1);
    assert_eq!(h.orchestrator.state().await, None);
}

#[tokio::test(start_paused = true)]
async fn second_start_while_scanning_notifies_both_callers() {
    let h = harness();
    let first = h
        .orchestrator
        .start(ScanConfig::new(ResultMode::Stream))
        .await
        .unwrap();

    let second = h
        .orchestrator
        .start(ScanConfig::new(ResultMode::Stream))
        .await
        .unwrap();

    assert_eq!(second.start, StartOutcome::AlreadyActive);
    assert_eq!(second.result.await.unwrap(), ScanOutcome::AlreadyActive);
    assert_eq!(first.result.await.unwrap(), ScanOutcome::AlreadyActive);
    assert_eq!(h.source.start_calls(), 1);
    assert_eq!(h.source.stop_calls(), 1);
    assert_eq!(h.orchestrator.state().await, None);
}

#[tokio::test(start_paused = true)]
async fn start_after_overlap_runs_normally() {
    let h = harness();
    let _first = h
        .orchestrator
        .start(ScanConfig::new(ResultMode::Stream))
        .await
        .unwrap();
    let _second = h
        .orchestrator
        .start(ScanConfig::new(ResultMode::Stream))
        .await
        .unwrap();

    let third = h
        .orchestrator
        .start(ScanConfig::new(ResultMode::Stream))
        .await
        .unwrap();

    assert_eq!(third.start, StartOutcome::Started);
    assert_eq!(h.orchestrator.state().await, Some(ScanState::Scanning));
    assert_eq!(h.source.start_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn single_pick_returns_device_at_selected_index() {
    let h = harness();
    let handle = h
        .orchestrator
        .start(ScanConfig::new(ResultMode::SinglePick))
        .await
        .unwrap();
    assert_eq!(handle.start, StartOutcome::AwaitingSelection);

    h.source.emit("A", Some("first"));
    h.source.emit("B", None);
    h.source.emit("A", Some("first"));
    h.source.emit("C", Some("third"));
    settle().await;

    assert_eq!(
        h.presentation.last_list(),
        vec!["[A] first", "[B] Unknown", "[C] third"]
    );

    let err = h.orchestrator.select(3).await.unwrap_err();
    assert_eq!(err, SelectionError::IndexOutOfRange { index: 3, count: 3 });
    assert_eq!(h.orchestrator.state().await, Some(ScanState::Scanning));

    h.orchestrator.select(2).await.unwrap();
    let outcome = handle.result.await.unwrap();
    assert_eq!(
        outcome,
        ScanOutcome::Success {
            device: Some(DeviceIdentity::new("C", None))
        }
    );
    assert_eq!(h.presentation.calls().last(), Some(&UiCall::Dismissed));
    assert_eq!(h.source.stop_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn single_pick_deadline_with_no_devices_reports_not_found() {
    let h = harness();
    let handle = h
        .orchestrator
        .start(
            ScanConfig::new(ResultMode::SinglePick).with_deadline(Some(Duration::from_secs(4))),
        )
        .await
        .unwrap();

    assert_eq!(
        handle.result.await.unwrap(),
        ScanOutcome::Failure(ScanFailure::NoDevicesFound)
    );
    let calls = h.presentation.calls();
    assert!(calls.contains(&UiCall::Status(
        ListStatus::NoDeviceFound,
        "No device found".to_string()
    )));
    assert_eq!(calls.last(), Some(&UiCall::Dismissed));
}

#[tokio::test(start_paused = true)]
async fn single_pick_deadline_with_devices_times_out() {
    let h = harness();
    let handle = h
        .orchestrator
        .start(
            ScanConfig::new(ResultMode::SinglePick).with_deadline(Some(Duration::from_secs(4))),
        )
        .await
        .unwrap();

    h.source.emit("A", Some("one"));
    h.source.emit("B", Some("two"));

    assert_eq!(
        handle.result.await.unwrap(),
        ScanOutcome::Failure(ScanFailure::SelectionTimedOut)
    );
    assert!(h.presentation.calls().contains(&UiCall::Status(
        ListStatus::AvailableDevices,
        "Available devices".to_string()
    )));
}

#[tokio::test(start_paused = true)]
async fn stopped_single_pick_waits_for_user() {
    let h = harness();
    let mut handle = h
        .orchestrator
        .start(ScanConfig::new(ResultMode::SinglePick))
        .await
        .unwrap();

    h.source.emit("A", Some("one"));
    settle().await;
    h.orchestrator.stop().await;
    settle().await;

    assert!(handle.result.try_recv().is_err());
    assert_eq!(h.orchestrator.state().await, Some(ScanState::Stopped));
    assert!(h.presentation.calls().contains(&UiCall::Status(
        ListStatus::AvailableDevices,
        "Available devices".to_string()
    )));

    h.orchestrator.select(0).await.unwrap();
    assert!(handle.result.await.unwrap().is_success());
}

#[tokio::test(start_paused = true)]
async fn cancel_reports_user_cancellation_once() {
    let h = harness();
    let handle = h
        .orchestrator
        .start(ScanConfig::new(ResultMode::SinglePick))
        .await
        .unwrap();

    h.orchestrator.cancel().await.unwrap();
    assert_eq!(
        h.orchestrator.cancel().await.unwrap_err(),
        SelectionError::NoPendingSelection
    );
    assert_eq!(
        h.orchestrator.select(0).await.unwrap_err(),
        SelectionError::NoPendingSelection
    );

    assert_eq!(
        handle.result.await.unwrap(),
        ScanOutcome::Failure(ScanFailure::SelectionCancelled {
            reason: "user cancelled".to_string()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn new_request_supersedes_open_pick() {
    let h = harness();
    let first = h
        .orchestrator
        .start(ScanConfig::new(ResultMode::SinglePick))
        .await
        .unwrap();
    h.orchestrator.stop().await;

    let second = h
        .orchestrator
        .start(ScanConfig::new(ResultMode::Stream))
        .await
        .unwrap();

    assert_eq!(second.start, StartOutcome::Started);
    assert!(matches!(
        first.result.await.unwrap(),
        ScanOutcome::Failure(ScanFailure::SelectionCancelled { .. })
    ));
    assert_eq!(h.orchestrator.state().await, Some(ScanState::Scanning));
}

#[tokio::test(start_paused = true)]
async fn source_finishing_ends_stream_scan() {
    let h = harness();
    let handle = h
        .orchestrator
        .start(ScanConfig::new(ResultMode::Stream))
        .await
        .unwrap();

    h.source.push(ScanSourceEvent::Finished);

    assert_eq!(handle.result.await.unwrap(), ScanOutcome::completed());
}

#[tokio::test(start_paused = true)]
async fn classic_scan_skips_filter_and_dedup() {
    let h = harness();
    let mut handle = h
        .orchestrator
        .start(
            ScanConfig::new(ResultMode::Stream)
                .with_name_prefix("Ble")
                .with_criteria(ScanCriteria {
                    kind: ScanKind::Classic,
                    ..ScanCriteria::default()
                }),
        )
        .await
        .unwrap();

    h.source.emit("01", Some("Headset"));
    h.source.emit("01", Some("Headset"));
    h.source.emit("02", None);
    h.source.push(ScanSourceEvent::Finished);

    assert_eq!(drain_addresses(&mut handle.sightings).await, vec!["01", "01", "02"]);
    assert_eq!(
        h.source.criteria.lock().unwrap()[0].kind,
        ScanKind::Classic
    );
}

#[tokio::test]
async fn classic_single_pick_is_rejected() {
    let h = harness();
    let result = h
        .orchestrator
        .start(
            ScanConfig::new(ResultMode::SinglePick).with_criteria(ScanCriteria {
                kind: ScanKind::Classic,
                ..ScanCriteria::default()
            }),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(h.source.start_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn source_start_failure_is_reported_as_outcome() {
    let mut source = MockSource::new();
    source
        .expect_start_scanning()
        .times(1)
        .returning(|_, _| Err(ScanSourceError::Unavailable("bluetooth disabled".to_string())));
    source.expect_stop_scanning().returning(|| Ok(()));

    let presentation = Arc::new(RecordingPresentation::default());
    let orchestrator = ScanOrchestrator::new(
        Arc::new(source),
        presentation.clone(),
        DisplayStrings::default(),
    );

    let handle = orchestrator
        .start(ScanConfig::new(ResultMode::SinglePick))
        .await
        .unwrap();

    assert_eq!(
        handle.result.await.unwrap(),
        ScanOutcome::Failure(ScanFailure::ScanSourceFailure(
            "scan adapter unavailable: bluetooth disabled".to_string()
        ))
    );
    assert_eq!(presentation.calls().last(), Some(&UiCall::Dismissed));
    assert_eq!(orchestrator.state().await, None);
}

#[tokio::test(start_paused = true)]
async fn preempted_scan_stops_source_once() {
    let mut source = MockSource::new();
    source
        .expect_start_scanning()
        .times(1)
        .returning(|_, _| Ok(()));
    source.expect_stop_scanning().times(1).returning(|| Ok(()));

    let orchestrator = ScanOrchestrator::new(
        Arc::new(source),
        Arc::new(RecordingPresentation::default()),
        DisplayStrings::default(),
    );

    let first = orchestrator
        .start(ScanConfig::new(ResultMode::SinglePick))
        .await
        .unwrap();
    let second = orchestrator
        .start(ScanConfig::new(ResultMode::SinglePick))
        .await
        .unwrap();
    orchestrator.stop().await;

    assert_eq!(first.result.await.unwrap(), ScanOutcome::AlreadyActive);
    assert_eq!(second.start, StartOutcome::AlreadyActive);
}
