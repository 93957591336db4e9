//! Listener trait and the ordered, failure-isolating listener set

use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use session_model::{
    CapabilitySet, CommandButton, Cue, DeviceState, EventSet, Extras, FieldChange, MediaItem,
    MediaMetadata, PlaybackParameters, PlaybackState, PlayerError, PositionInfo, RepeatMode,
    Snapshot, SuppressionReason, Timeline,
};

/// Receives the change cycles of one controller
///
/// Every method has a no-op default, so implementors override only what
/// they care about. Per-field callbacks of a cycle run first, in delivery
/// order, then [`Listener::on_events`] runs once with the cycle's tags.
///
/// # Example
///
/// ```rust,ignore
/// struct TitlePrinter;
///
/// impl Listener for TitlePrinter {
///     fn on_metadata_changed(&mut self, metadata: &MediaMetadata) {
///         println!("Now playing: {:?}", metadata.effective_title());
///     }
/// }
/// ```
pub trait Listener: Send {
    fn on_timeline_changed(&mut self, _timeline: &Timeline) {}

    fn on_current_item_changed(&mut self, _index: Option<usize>, _item: Option<&MediaItem>) {}

    fn on_metadata_changed(&mut self, _metadata: &MediaMetadata) {}

    fn on_position_changed(&mut self, _position: &PositionInfo) {}

    fn on_playback_state_changed(&mut self, _state: PlaybackState) {}

    fn on_play_when_ready_changed(&mut self, _play_when_ready: bool) {}

    fn on_suppression_changed(&mut self, _reason: SuppressionReason) {}

    /// `None` when the error was cleared
    fn on_player_error_changed(&mut self, _error: Option<&PlayerError>) {}

    fn on_playback_parameters_changed(&mut self, _parameters: PlaybackParameters) {}

    fn on_repeat_mode_changed(&mut self, _mode: RepeatMode) {}

    fn on_shuffle_changed(&mut self, _enabled: bool) {}

    fn on_available_commands_changed(&mut self, _commands: &CapabilitySet) {}

    fn on_device_changed(&mut self, _device: &DeviceState) {}

    fn on_cues_changed(&mut self, _cues: &[Cue]) {}

    fn on_custom_layout_changed(&mut self, _layout: &[CommandButton]) {}

    fn on_extras_changed(&mut self, _extras: &Extras) {}

    /// Entry point for one field change
    ///
    /// The default routes to the matching `on_*_changed` method.
    fn on_field_changed(&mut self, change: &FieldChange) {
        match change {
            FieldChange::Timeline(timeline) => self.on_timeline_changed(timeline),
            FieldChange::CurrentItem { index, item } => {
                self.on_current_item_changed(*index, item.as_ref())
            }
            FieldChange::Metadata(metadata) => self.on_metadata_changed(metadata),
            FieldChange::Position(position) => self.on_position_changed(position),
            FieldChange::PlaybackState(state) => self.on_playback_state_changed(*state),
            FieldChange::PlayWhenReady(value) => self.on_play_when_ready_changed(*value),
            FieldChange::Suppression(reason) => self.on_suppression_changed(*reason),
            FieldChange::PlayerError(error) => self.on_player_error_changed(error.as_ref()),
            FieldChange::PlaybackParameters(parameters) => {
                self.on_playback_parameters_changed(*parameters)
            }
            FieldChange::RepeatMode(mode) => self.on_repeat_mode_changed(*mode),
            FieldChange::Shuffle(enabled) => self.on_shuffle_changed(*enabled),
            FieldChange::AvailableCommands(commands) => self.on_available_commands_changed(commands),
            FieldChange::Device(device) => self.on_device_changed(device),
            FieldChange::Cues(cues) => self.on_cues_changed(cues),
            FieldChange::CustomLayout(layout) => self.on_custom_layout_changed(layout),
            FieldChange::Extras(extras) => self.on_extras_changed(extras),
        }
    }

    /// Called once per cycle after every field callback
    ///
    /// `snapshot` is the controller's snapshot with the whole cycle applied.
    fn on_events(&mut self, _snapshot: &Snapshot, _events: &EventSet) {}
}

/// Listener built from a closure over the aggregate callback
pub struct EventsListener<F> {
    callback: F,
}

impl<F> EventsListener<F>
where
    F: FnMut(&Snapshot, &EventSet) + Send,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> Listener for EventsListener<F>
where
    F: FnMut(&Snapshot, &EventSet) + Send,
{
    fn on_events(&mut self, snapshot: &Snapshot, events: &EventSet) {
        (self.callback)(snapshot, events)
    }
}

/// Handle identifying one registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

struct Registration {
    id: ListenerId,
    listener: Box<dyn Listener>,
    consecutive_failures: u32,
}

/// Listeners in registration order
///
/// A panicking callback is caught and logged; delivery to the other
/// listeners continues. A listener that fails in `max_failures` consecutive
/// cycles is unregistered at the end of the cycle.
pub struct ListenerSet {
    entries: Vec<Registration>,
    failed_this_cycle: HashSet<ListenerId>,
    max_failures: u32,
}

impl ListenerSet {
    pub fn new(max_failures: u32) -> Self {
        Self {
            entries: Vec::new(),
            failed_this_cycle: HashSet::new(),
            max_failures: max_failures.max(1),
        }
    }

    pub fn add(&mut self, id: ListenerId, listener: Box<dyn Listener>) {
        self.entries.push(Registration {
            id,
            listener,
            consecutive_failures: 0,
        });
    }

    /// Returns whether the listener was registered
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<ListenerId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    /// Deliver one field change to every listener
    pub fn deliver_field(&mut self, change: &FieldChange) {
        for entry in &mut self.entries {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                entry.listener.on_field_changed(change)
            }));
            if outcome.is_err() {
                warn!(
                    "{} panicked while handling {} change",
                    entry.id,
                    change.tag()
                );
                self.failed_this_cycle.insert(entry.id);
            }
        }
    }

    /// Deliver the aggregate to every listener
    pub fn deliver_events(&mut self, snapshot: &Snapshot, events: &EventSet) {
        for entry in &mut self.entries {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                entry.listener.on_events(snapshot, events)
            }));
            if outcome.is_err() {
                warn!("{} panicked while handling aggregate events", entry.id);
                self.failed_this_cycle.insert(entry.id);
            }
        }
    }

    /// Settle failure counters; returns the listeners dropped this cycle
    pub fn end_cycle(&mut self) -> Vec<ListenerId> {
        let failed = std::mem::take(&mut self.failed_this_cycle);
        let max_failures = self.max_failures;
        let mut dropped = Vec::new();

        for entry in &mut self.entries {
            if failed.contains(&entry.id) {
                entry.consecutive_failures += 1;
            } else {
                entry.consecutive_failures = 0;
            }
        }
        self.entries.retain(|entry| {
            if entry.consecutive_failures >= max_failures {
                dropped.push(entry.id);
                false
            } else {
                true
            }
        });

        for id in &dropped {
            warn!(
                "Unregistering {} after {} consecutive failed cycles",
                id, max_failures
            );
        }
        if !failed.is_empty() && dropped.is_empty() {
            debug!("{} listener(s) failed this cycle", failed.len());
        }
        dropped
    }
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.ids())
            .field("max_failures", &self.max_failures)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Listener for Recorder {
        fn on_play_when_ready_changed(&mut self, value: bool) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:play_when_ready={}", self.name, value));
        }

        fn on_player_error_changed(&mut self, error: Option<&PlayerError>) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:error={:?}", self.name, error.map(|e| e.code)));
        }

        fn on_events(&mut self, _snapshot: &Snapshot, events: &EventSet) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:events={}", self.name, events.len()));
        }
    }

    struct Panicker;

    impl Listener for Panicker {
        fn on_field_changed(&mut self, _change: &FieldChange) {
            panic!("listener failure");
        }
    }

    #[test]
    fn test_default_routing_reaches_specific_method() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut recorder = Recorder {
            name: "a",
            log: log.clone(),
        };
        recorder.on_field_changed(&FieldChange::PlayWhenReady(true));
        recorder.on_field_changed(&FieldChange::Shuffle(true));
        assert_eq!(*log.lock().unwrap(), vec!["a:play_when_ready=true"]);
    }

    #[test]
    fn test_player_error_routing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut recorder = Recorder {
            name: "a",
            log: log.clone(),
        };
        recorder.on_field_changed(&FieldChange::PlayerError(Some(PlayerError::new(4, "io"))));
        recorder.on_field_changed(&FieldChange::PlayerError(None));
        assert_eq!(*log.lock().unwrap(), vec!["a:error=Some(4)", "a:error=None"]);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut set = ListenerSet::new(3);
        set.add(ListenerId::new(1), Box::new(Panicker));
        set.add(
            ListenerId::new(2),
            Box::new(Recorder {
                name: "b",
                log: log.clone(),
            }),
        );

        set.deliver_field(&FieldChange::PlayWhenReady(false));
        assert!(set.end_cycle().is_empty());
        assert_eq!(*log.lock().unwrap(), vec!["b:play_when_ready=false"]);
    }

    #[test]
    fn test_listener_dropped_after_consecutive_failures() {
        let mut set = ListenerSet::new(2);
        set.add(ListenerId::new(1), Box::new(Panicker));

        set.deliver_field(&FieldChange::Shuffle(true));
        assert!(set.end_cycle().is_empty());
        set.deliver_field(&FieldChange::Shuffle(false));
        assert_eq!(set.end_cycle(), vec![ListenerId::new(1)]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_clean_cycle_resets_failures() {
        let mut set = ListenerSet::new(2);
        set.add(ListenerId::new(1), Box::new(Panicker));

        set.deliver_field(&FieldChange::Shuffle(true));
        set.end_cycle();
        // Aggregate-only cycle: Panicker's on_events is the no-op default
        set.deliver_events(&Snapshot::default(), &EventSet::new());
        set.end_cycle();
        set.deliver_field(&FieldChange::Shuffle(false));
        assert!(set.end_cycle().is_empty());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut set = ListenerSet::new(3);
        set.add(ListenerId::new(7), Box::new(Panicker));
        assert!(set.remove(ListenerId::new(7)));
        assert!(!set.remove(ListenerId::new(7)));
    }
}
