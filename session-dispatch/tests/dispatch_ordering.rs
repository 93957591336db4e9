//! Delivery ordering tests for the dispatch worker
//!
//! Covers per-field order, the single trailing aggregate, reentrant work
//! from callbacks, listener failures and release.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use proptest::prelude::*;
use session_dispatch::{
    spawn_dispatch_worker, CycleIterator, DispatchConfig, DispatchHandle, Listener,
};
use session_model::{
    Cycle, EventSet, FieldChange, PlaybackState, RepeatMode, Snapshot,
};

// ============================================================================
// Test Helpers
// ============================================================================

const WAIT: Duration = Duration::from_secs(2);

type Log = Arc<Mutex<Vec<String>>>;

/// Records every callback as a string
struct Recorder {
    log: Log,
}

impl Listener for Recorder {
    fn on_field_changed(&mut self, change: &FieldChange) {
        self.log.lock().unwrap().push(format!("field:{}", change.tag()));
    }

    fn on_events(&mut self, snapshot: &Snapshot, events: &EventSet) {
        self.log
            .lock()
            .unwrap()
            .push(format!("events:v{}:{}", snapshot.version(), events.len()));
    }
}

/// Enqueues a follow-up cycle from inside the aggregate callback of v1
struct Reentrant {
    handle: DispatchHandle,
    log: Log,
}

impl Listener for Reentrant {
    fn on_field_changed(&mut self, change: &FieldChange) {
        self.log.lock().unwrap().push(format!("field:{}", change.tag()));
    }

    fn on_events(&mut self, snapshot: &Snapshot, _events: &EventSet) {
        self.log
            .lock()
            .unwrap()
            .push(format!("events:v{}", snapshot.version()));
        if snapshot.version() == 1 {
            self.handle
                .enqueue_cycle(Cycle::new(2, vec![FieldChange::Shuffle(true)]))
                .unwrap();
            self.log.lock().unwrap().push("enqueued:v2".to_string());
        }
    }
}

/// Releases the worker while handling the first field of a cycle
struct Releaser {
    handle: DispatchHandle,
    log: Log,
}

impl Listener for Releaser {
    fn on_field_changed(&mut self, change: &FieldChange) {
        self.log.lock().unwrap().push(format!("field:{}", change.tag()));
        self.handle.release();
    }

    fn on_events(&mut self, snapshot: &Snapshot, _events: &EventSet) {
        self.log
            .lock()
            .unwrap()
            .push(format!("events:v{}", snapshot.version()));
    }
}

struct AlwaysPanics;

impl Listener for AlwaysPanics {
    fn on_field_changed(&mut self, _change: &FieldChange) {
        panic!("broken listener");
    }
}

fn spawn() -> DispatchHandle {
    spawn_dispatch_worker(DispatchConfig::default(), Snapshot::default()).unwrap()
}

fn wait_for(cycles: &CycleIterator, count: usize) -> Vec<u64> {
    cycles
        .timeout_iter(WAIT)
        .take(count)
        .map(|cycle| cycle.version)
        .collect()
}

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_fields_then_single_aggregate() {
    let handle = spawn();
    let log = new_log();
    handle
        .add_listener(Box::new(Recorder { log: log.clone() }))
        .unwrap();
    let cycles = handle.subscribe().unwrap();

    handle
        .enqueue_cycle(Cycle::new(
            1,
            vec![
                FieldChange::PlaybackState(PlaybackState::Ready),
                FieldChange::PlayWhenReady(true),
            ],
        ))
        .unwrap();
    assert_eq!(wait_for(&cycles, 1), vec![1]);

    assert_eq!(
        entries(&log),
        vec!["field:playback_state", "field:play_when_ready", "events:v1:2"]
    );
    handle.release();
}

#[test]
fn test_listeners_called_in_registration_order() {
    let handle = spawn();
    let log = new_log();

    struct Named(&'static str, Log);
    impl Listener for Named {
        fn on_events(&mut self, _snapshot: &Snapshot, _events: &EventSet) {
            self.1.lock().unwrap().push(self.0.to_string());
        }
    }

    handle.add_listener(Box::new(Named("first", log.clone()))).unwrap();
    handle.add_listener(Box::new(Named("second", log.clone()))).unwrap();
    let cycles = handle.subscribe().unwrap();

    handle
        .enqueue_cycle(Cycle::new(1, vec![FieldChange::RepeatMode(RepeatMode::All)]))
        .unwrap();
    wait_for(&cycles, 1);

    assert_eq!(entries(&log), vec!["first", "second"]);
    handle.release();
}

#[test]
fn test_reentrant_enqueue_becomes_next_cycle() {
    let handle = spawn();
    let log = new_log();
    handle
        .add_listener(Box::new(Reentrant {
            handle: handle.clone(),
            log: log.clone(),
        }))
        .unwrap();
    let cycles = handle.subscribe().unwrap();

    handle
        .enqueue_cycle(Cycle::new(1, vec![FieldChange::PlayWhenReady(true)]))
        .unwrap();
    assert_eq!(wait_for(&cycles, 2), vec![1, 2]);

    assert_eq!(
        entries(&log),
        vec![
            "field:play_when_ready",
            "events:v1",
            "enqueued:v2",
            "field:shuffle",
            "events:v2",
        ]
    );
    let snapshot = handle.snapshot();
    assert!(snapshot.play_when_ready());
    assert!(snapshot.shuffle_enabled());
    handle.release();
}

#[test]
fn test_empty_cycle_is_not_delivered() {
    let handle = spawn();
    let log = new_log();
    handle
        .add_listener(Box::new(Recorder { log: log.clone() }))
        .unwrap();
    let cycles = handle.subscribe().unwrap();

    handle.enqueue_cycle(Cycle::new(1, Vec::new())).unwrap();
    handle
        .enqueue_cycle(Cycle::new(2, vec![FieldChange::Shuffle(true)]))
        .unwrap();

    assert_eq!(wait_for(&cycles, 1), vec![2]);
    assert_eq!(entries(&log), vec!["field:shuffle", "events:v2:1"]);
    handle.release();
}

// ============================================================================
// Failures and release
// ============================================================================

#[test]
fn test_panicking_listener_is_isolated_then_dropped() {
    let config = DispatchConfig {
        max_listener_failures: 2,
        ..Default::default()
    };
    let handle = spawn_dispatch_worker(config, Snapshot::default()).unwrap();
    let log = new_log();
    handle.add_listener(Box::new(AlwaysPanics)).unwrap();
    handle
        .add_listener(Box::new(Recorder { log: log.clone() }))
        .unwrap();
    let cycles = handle.subscribe().unwrap();

    for version in 1..=3 {
        handle
            .enqueue_cycle(Cycle::new(
                version,
                vec![FieldChange::PlayWhenReady(version % 2 == 1)],
            ))
            .unwrap();
    }
    assert_eq!(wait_for(&cycles, 3), vec![1, 2, 3]);

    let (tx, rx) = std::sync::mpsc::channel();
    handle
        .call(move |snapshot| {
            let _ = tx.send(snapshot.version());
        })
        .unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 3);

    assert_eq!(
        entries(&log)
            .iter()
            .filter(|entry| entry.starts_with("events"))
            .count(),
        3
    );
    handle.release();
}

#[test]
fn test_release_inside_callback_finishes_current_cycle_only() {
    let handle = spawn();
    let log = new_log();
    handle
        .add_listener(Box::new(Releaser {
            handle: handle.clone(),
            log: log.clone(),
        }))
        .unwrap();
    let cycles = handle.subscribe().unwrap();

    handle
        .enqueue_cycle(Cycle::new(1, vec![FieldChange::PlayWhenReady(true)]))
        .unwrap();
    let _ = handle.enqueue_cycle(Cycle::new(2, vec![FieldChange::Shuffle(true)]));

    let delivered: Vec<u64> = cycles.timeout_iter(WAIT).map(|cycle| cycle.version).collect();
    assert_eq!(delivered, vec![1]);
    assert_eq!(entries(&log), vec!["field:play_when_ready", "events:v1"]);
    assert!(handle.is_released());
}

#[test]
fn test_release_from_outside_joins_worker() {
    let handle = spawn();
    let cycles = handle.subscribe().unwrap();
    handle.release();

    // Worker gone: the subscriber channel is closed
    assert!(cycles.recv_timeout(WAIT).is_none());
    assert!(handle.add_listener(Box::new(AlwaysPanics)).is_err());
}

// ============================================================================
// Properties
// ============================================================================

fn candidate_changes() -> Vec<FieldChange> {
    vec![
        FieldChange::PlaybackState(PlaybackState::Buffering),
        FieldChange::PlayWhenReady(true),
        FieldChange::RepeatMode(RepeatMode::One),
        FieldChange::Shuffle(true),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Field callbacks arrive in cycle order, then exactly one aggregate
    #[test]
    fn prop_aggregate_delivered_once_after_fields(
        changes in proptest::sample::subsequence(candidate_changes(), 1..=4)
    ) {
        let handle = spawn();
        let log = new_log();
        handle.add_listener(Box::new(Recorder { log: log.clone() })).unwrap();
        let cycles = handle.subscribe().unwrap();

        let expected_fields: Vec<String> = changes
            .iter()
            .map(|change| format!("field:{}", change.tag()))
            .collect();
        let count = changes.len();
        handle.enqueue_cycle(Cycle::new(1, changes)).unwrap();
        prop_assert_eq!(wait_for(&cycles, 1), vec![1]);

        let recorded = entries(&log);
        prop_assert_eq!(recorded.len(), count + 1);
        prop_assert_eq!(&recorded[..count], &expected_fields[..]);
        prop_assert_eq!(&recorded[count], &format!("events:v1:{}", count));

        handle.release();
    }
}
