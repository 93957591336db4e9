//! Immutable, versioned player snapshot
//!
//! A [`Snapshot`] is the full observable state of a player at one point in
//! version time. Snapshots are only ever produced by
//! [`SnapshotBuilder::build`], which rejects values that break the
//! invariants (see [`ModelError`]). Every "mutation" produces a new value.
//!
//! # Example
//!
//! ```rust,ignore
//! use session_model::{MediaItem, PlaybackState, Snapshot, Timeline};
//!
//! let snapshot = Snapshot::builder()
//!     .timeline(Timeline::new(vec![MediaItem::titled("a", "First")]))
//!     .current_index(Some(0))
//!     .playback_state(PlaybackState::Ready)
//!     .play_when_ready(true)
//!     .build()?;
//!
//! let paused = snapshot.with_play_when_ready(false);
//! assert!(snapshot.play_when_ready());
//! assert!(!paused.play_when_ready());
//! ```

use serde::{Deserialize, Serialize};

use super::{
    CommandButton, Cue, DeviceState, Extras, MediaItem, MediaMetadata, PlaybackParameters,
    PlaybackState, PlayerError, PositionInfo, RepeatMode, SuppressionReason, Timeline,
};
use crate::change::FieldChange;
use crate::commands::{CapabilitySet, PlayerCommands};
use crate::error::{ModelError, Result};

/// Full observable player state
///
/// Fields are private; read them through the getters and derive new
/// snapshots through [`Snapshot::to_builder`] or the `with_*` helpers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotBuilder", into = "SnapshotBuilder")]
pub struct Snapshot {
    pub(crate) version: u64,
    pub(crate) timeline: Timeline,
    pub(crate) current_index: Option<usize>,
    pub(crate) metadata: MediaMetadata,
    pub(crate) position: PositionInfo,
    pub(crate) playback_state: PlaybackState,
    pub(crate) play_when_ready: bool,
    pub(crate) suppression: SuppressionReason,
    pub(crate) player_error: Option<PlayerError>,
    pub(crate) parameters: PlaybackParameters,
    pub(crate) repeat_mode: RepeatMode,
    pub(crate) shuffle_enabled: bool,
    pub(crate) available_commands: CapabilitySet,
    pub(crate) device: DeviceState,
    pub(crate) cues: Vec<Cue>,
    pub(crate) custom_layout: Vec<CommandButton>,
    pub(crate) extras: Extras,
}

impl Snapshot {
    /// Start building a snapshot from the defaults
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    /// Builder pre-filled with this snapshot's values
    pub fn to_builder(&self) -> SnapshotBuilder {
        SnapshotBuilder::from(self.clone())
    }

    // ========================================================================
    // Getters
    // ========================================================================

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Index of the current item, `None` when the timeline is empty
    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current_item(&self) -> Option<&MediaItem> {
        self.current_index.and_then(|index| self.timeline.get(index))
    }

    /// Metadata of what is currently playing
    pub fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }

    pub fn position(&self) -> &PositionInfo {
        &self.position
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback_state
    }

    pub fn play_when_ready(&self) -> bool {
        self.play_when_ready
    }

    pub fn suppression(&self) -> SuppressionReason {
        self.suppression
    }

    /// Error that stopped the player, if any
    pub fn player_error(&self) -> Option<&PlayerError> {
        self.player_error.as_ref()
    }

    /// Ready, play requested and nothing suppressing it
    pub fn is_playing(&self) -> bool {
        self.playback_state == PlaybackState::Ready
            && self.play_when_ready
            && !self.suppression.is_suppressed()
            && self.player_error.is_none()
    }

    pub fn parameters(&self) -> PlaybackParameters {
        self.parameters
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle_enabled
    }

    /// Commands available on this snapshot
    ///
    /// On a raw session snapshot these are the player-reported commands; on
    /// a filtered snapshot, the commands effective for one controller.
    pub fn available_commands(&self) -> &CapabilitySet {
        &self.available_commands
    }

    pub fn device(&self) -> &DeviceState {
        &self.device
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn custom_layout(&self) -> &[CommandButton] {
        &self.custom_layout
    }

    pub fn extras(&self) -> &Extras {
        &self.extras
    }

    // ========================================================================
    // Copy-with helpers
    // ========================================================================

    /// Same state, different version
    pub fn with_version(&self, version: u64) -> Snapshot {
        Snapshot {
            version,
            ..self.clone()
        }
    }

    /// Replace the timeline and current index together
    pub fn with_timeline(&self, timeline: Timeline, current_index: Option<usize>) -> Result<Snapshot> {
        self.to_builder()
            .timeline(timeline)
            .current_index(current_index)
            .build()
    }

    pub fn with_current_index(&self, current_index: Option<usize>) -> Result<Snapshot> {
        self.to_builder().current_index(current_index).build()
    }

    pub fn with_playback_state(&self, playback_state: PlaybackState) -> Snapshot {
        Snapshot {
            playback_state,
            ..self.clone()
        }
    }

    pub fn with_play_when_ready(&self, play_when_ready: bool) -> Snapshot {
        Snapshot {
            play_when_ready,
            ..self.clone()
        }
    }

    pub fn with_available_commands(&self, available_commands: CapabilitySet) -> Snapshot {
        Snapshot {
            available_commands,
            ..self.clone()
        }
    }

    /// Apply one field change, producing the next snapshot
    pub fn apply(&self, change: &FieldChange) -> Result<Snapshot> {
        self.to_builder().apply(change).build()
    }

    /// Apply an ordered list of field changes as one step
    ///
    /// Invariants are only checked on the final value, so a timeline change
    /// and the index change it forces may arrive in either order.
    pub fn apply_all(&self, changes: &[FieldChange]) -> Result<Snapshot> {
        changes
            .iter()
            .fold(self.to_builder(), SnapshotBuilder::apply)
            .build()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        let SnapshotBuilder {
            version,
            timeline,
            current_index,
            metadata,
            position,
            playback_state,
            play_when_ready,
            suppression,
            player_error,
            parameters,
            repeat_mode,
            shuffle_enabled,
            available_commands,
            device,
            cues,
            custom_layout,
            extras,
        } = SnapshotBuilder::default();

        Snapshot {
            version,
            timeline,
            current_index,
            metadata,
            position,
            playback_state,
            play_when_ready,
            suppression,
            player_error,
            parameters,
            repeat_mode,
            shuffle_enabled,
            available_commands,
            device,
            cues,
            custom_layout,
            extras,
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Mutable staging area for a [`Snapshot`]
///
/// Also the serialized form of a snapshot, so deserialized snapshots go
/// through the same validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotBuilder {
    version: u64,
    timeline: Timeline,
    current_index: Option<usize>,
    metadata: MediaMetadata,
    position: PositionInfo,
    playback_state: PlaybackState,
    play_when_ready: bool,
    suppression: SuppressionReason,
    player_error: Option<PlayerError>,
    parameters: PlaybackParameters,
    repeat_mode: RepeatMode,
    shuffle_enabled: bool,
    available_commands: CapabilitySet,
    device: DeviceState,
    cues: Vec<Cue>,
    custom_layout: Vec<CommandButton>,
    extras: Extras,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self {
            version: 0,
            timeline: Timeline::empty(),
            current_index: None,
            metadata: MediaMetadata::default(),
            position: PositionInfo::default(),
            playback_state: PlaybackState::Idle,
            play_when_ready: false,
            suppression: SuppressionReason::None,
            player_error: None,
            parameters: PlaybackParameters::DEFAULT,
            repeat_mode: RepeatMode::Off,
            shuffle_enabled: false,
            available_commands: CapabilitySet::new(
                PlayerCommands::all(),
                Default::default(),
            ),
            device: DeviceState::default(),
            cues: Vec::new(),
            custom_layout: Vec::new(),
            extras: Extras::new(),
        }
    }
}

impl SnapshotBuilder {
    pub fn version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = timeline;
        self
    }

    pub fn current_index(mut self, current_index: Option<usize>) -> Self {
        self.current_index = current_index;
        self
    }

    pub fn metadata(mut self, metadata: MediaMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn position(mut self, position: PositionInfo) -> Self {
        self.position = position;
        self
    }

    pub fn playback_state(mut self, playback_state: PlaybackState) -> Self {
        self.playback_state = playback_state;
        self
    }

    pub fn play_when_ready(mut self, play_when_ready: bool) -> Self {
        self.play_when_ready = play_when_ready;
        self
    }

    pub fn suppression(mut self, suppression: SuppressionReason) -> Self {
        self.suppression = suppression;
        self
    }

    pub fn player_error(mut self, player_error: Option<PlayerError>) -> Self {
        self.player_error = player_error;
        self
    }

    pub fn parameters(mut self, parameters: PlaybackParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn repeat_mode(mut self, repeat_mode: RepeatMode) -> Self {
        self.repeat_mode = repeat_mode;
        self
    }

    pub fn shuffle_enabled(mut self, shuffle_enabled: bool) -> Self {
        self.shuffle_enabled = shuffle_enabled;
        self
    }

    pub fn available_commands(mut self, available_commands: CapabilitySet) -> Self {
        self.available_commands = available_commands;
        self
    }

    pub fn device(mut self, device: DeviceState) -> Self {
        self.device = device;
        self
    }

    pub fn cues(mut self, cues: Vec<Cue>) -> Self {
        self.cues = cues;
        self
    }

    pub fn custom_layout(mut self, custom_layout: Vec<CommandButton>) -> Self {
        self.custom_layout = custom_layout;
        self
    }

    pub fn extras(mut self, extras: Extras) -> Self {
        self.extras = extras;
        self
    }

    /// Read access for closures that derive a value from the staged state
    pub fn staged_timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn staged_current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn staged_position(&self) -> &PositionInfo {
        &self.position
    }

    pub fn staged_playback_state(&self) -> PlaybackState {
        self.playback_state
    }

    pub fn staged_play_when_ready(&self) -> bool {
        self.play_when_ready
    }

    pub fn staged_parameters(&self) -> PlaybackParameters {
        self.parameters
    }

    pub fn staged_device(&self) -> &DeviceState {
        &self.device
    }

    /// Stage the value carried by a field change
    pub fn apply(self, change: &FieldChange) -> Self {
        match change {
            FieldChange::Timeline(timeline) => self.timeline(timeline.clone()),
            FieldChange::CurrentItem { index, .. } => self.current_index(*index),
            FieldChange::Metadata(metadata) => self.metadata(metadata.clone()),
            FieldChange::Position(position) => self.position(*position),
            FieldChange::PlaybackState(state) => self.playback_state(*state),
            FieldChange::PlayWhenReady(play_when_ready) => self.play_when_ready(*play_when_ready),
            FieldChange::Suppression(reason) => self.suppression(*reason),
            FieldChange::PlayerError(error) => self.player_error(error.clone()),
            FieldChange::PlaybackParameters(parameters) => self.parameters(*parameters),
            FieldChange::RepeatMode(mode) => self.repeat_mode(*mode),
            FieldChange::Shuffle(enabled) => self.shuffle_enabled(*enabled),
            FieldChange::AvailableCommands(commands) => self.available_commands(commands.clone()),
            FieldChange::Device(device) => self.device(*device),
            FieldChange::Cues(cues) => self.cues(cues.clone()),
            FieldChange::CustomLayout(layout) => self.custom_layout(layout.clone()),
            FieldChange::Extras(extras) => self.extras(extras.clone()),
        }
    }

    /// Validate and freeze
    pub fn build(self) -> Result<Snapshot> {
        let len = self.timeline.len();
        let index_valid = match self.current_index {
            None => len == 0,
            Some(index) => index < len,
        };
        if !index_valid {
            return Err(ModelError::CurrentIndexOutOfBounds {
                index: self.current_index,
                len,
            });
        }

        if !self.timeline.has_valid_shuffle_order() {
            return Err(ModelError::InvalidShuffleOrder {
                order: self.timeline.shuffle_order().unwrap_or_default().to_vec(),
                len,
            });
        }

        if !self.parameters.is_valid() {
            return Err(ModelError::InvalidPlaybackParameters {
                speed: self.parameters.speed,
                pitch: self.parameters.pitch,
            });
        }

        let player_volume = self.device.player_volume;
        if !(0.0..=1.0).contains(&player_volume) {
            return Err(ModelError::VolumeOutOfRange(player_volume));
        }

        let info = self.device.info;
        if info.min_volume > info.max_volume {
            return Err(ModelError::InvalidDeviceRange {
                min: info.min_volume,
                max: info.max_volume,
            });
        }
        if !(info.min_volume..=info.max_volume).contains(&self.device.volume) {
            return Err(ModelError::DeviceVolumeOutOfRange {
                volume: self.device.volume,
                min: info.min_volume,
                max: info.max_volume,
            });
        }

        Ok(Snapshot {
            version: self.version,
            timeline: self.timeline,
            current_index: self.current_index,
            metadata: self.metadata,
            position: self.position.clamped(),
            playback_state: self.playback_state,
            play_when_ready: self.play_when_ready,
            suppression: self.suppression,
            player_error: self.player_error,
            parameters: self.parameters,
            repeat_mode: self.repeat_mode,
            shuffle_enabled: self.shuffle_enabled,
            available_commands: self.available_commands,
            device: self.device,
            cues: self.cues,
            custom_layout: self.custom_layout,
            extras: self.extras,
        })
    }
}

impl From<Snapshot> for SnapshotBuilder {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            version: snapshot.version,
            timeline: snapshot.timeline,
            current_index: snapshot.current_index,
            metadata: snapshot.metadata,
            position: snapshot.position,
            playback_state: snapshot.playback_state,
            play_when_ready: snapshot.play_when_ready,
            suppression: snapshot.suppression,
            player_error: snapshot.player_error,
            parameters: snapshot.parameters,
            repeat_mode: snapshot.repeat_mode,
            shuffle_enabled: snapshot.shuffle_enabled,
            available_commands: snapshot.available_commands,
            device: snapshot.device,
            cues: snapshot.cues,
            custom_layout: snapshot.custom_layout,
            extras: snapshot.extras,
        }
    }
}

impl TryFrom<SnapshotBuilder> for Snapshot {
    type Error = ModelError;

    fn try_from(builder: SnapshotBuilder) -> Result<Snapshot> {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeviceInfo, PlaybackType};

    fn two_items() -> Timeline {
        Timeline::new(vec![MediaItem::titled("a", "A"), MediaItem::titled("b", "B")])
    }

    #[test]
    fn test_default_snapshot_is_valid() {
        let snapshot = Snapshot::default();
        assert_eq!(snapshot.current_index(), None);
        assert!(snapshot.timeline().is_empty());
        assert_eq!(Snapshot::builder().build().unwrap(), snapshot);
    }

    #[test]
    fn test_index_must_match_timeline() {
        let err = Snapshot::builder().current_index(Some(0)).build().unwrap_err();
        assert_eq!(
            err,
            ModelError::CurrentIndexOutOfBounds {
                index: Some(0),
                len: 0
            }
        );

        assert!(Snapshot::builder()
            .timeline(two_items())
            .current_index(None)
            .build()
            .is_err());
        assert!(Snapshot::builder()
            .timeline(two_items())
            .current_index(Some(2))
            .build()
            .is_err());
        assert!(Snapshot::builder()
            .timeline(two_items())
            .current_index(Some(1))
            .build()
            .is_ok());
    }

    #[test]
    fn test_invalid_shuffle_order_rejected() {
        let err = Snapshot::builder()
            .timeline(two_items().with_shuffle_order(vec![1, 1]))
            .current_index(Some(0))
            .build()
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidShuffleOrder { .. }));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(Snapshot::builder()
            .parameters(PlaybackParameters::new(0.0, 1.0))
            .build()
            .is_err());
    }

    #[test]
    fn test_volume_ranges() {
        let mut device = DeviceState::new(
            DeviceInfo {
                playback_type: PlaybackType::Remote,
                min_volume: 0,
                max_volume: 10,
            },
            5,
        );
        assert!(Snapshot::builder().device(device).build().is_ok());

        device.volume = 11;
        assert!(matches!(
            Snapshot::builder().device(device).build(),
            Err(ModelError::DeviceVolumeOutOfRange { volume: 11, .. })
        ));

        device.volume = 5;
        device.player_volume = 1.5;
        assert_eq!(
            Snapshot::builder().device(device).build(),
            Err(ModelError::VolumeOutOfRange(1.5))
        );
    }

    #[test]
    fn test_position_clamped_on_build() {
        let snapshot = Snapshot::builder()
            .position(PositionInfo::new(5_000, Some(3_000), 4_000))
            .build()
            .unwrap();
        assert_eq!(snapshot.position().position_ms, 3_000);
        assert_eq!(snapshot.position().buffered_position_ms, 3_000);
    }

    #[test]
    fn test_apply_all_checks_final_value_only() {
        let snapshot = Snapshot::builder()
            .timeline(two_items())
            .current_index(Some(1))
            .build()
            .unwrap();

        // Index change listed after the timeline shrink that forces it
        let next = snapshot
            .apply_all(&[
                FieldChange::Timeline(Timeline::single(MediaItem::titled("a", "A"))),
                FieldChange::CurrentItem {
                    index: Some(0),
                    item: None,
                },
            ])
            .unwrap();
        assert_eq!(next.timeline().len(), 1);
        assert_eq!(next.current_index(), Some(0));

        // Applying the shrink alone is invalid
        assert!(snapshot
            .apply(&FieldChange::Timeline(Timeline::single(MediaItem::titled(
                "a", "A"
            ))))
            .is_err());
    }

    #[test]
    fn test_current_item() {
        let snapshot = Snapshot::default()
            .with_timeline(two_items(), Some(1))
            .unwrap();
        assert_eq!(snapshot.current_item().map(|i| i.media_id.as_str()), Some("b"));
    }

    #[test]
    fn test_is_playing() {
        let snapshot = Snapshot::default()
            .with_playback_state(PlaybackState::Ready)
            .with_play_when_ready(true);
        assert!(snapshot.is_playing());

        let suppressed = snapshot
            .to_builder()
            .suppression(SuppressionReason::TransientAudioFocusLoss)
            .build()
            .unwrap();
        assert!(!suppressed.is_playing());
    }

    #[test]
    fn test_player_error_stops_playing() {
        let snapshot = Snapshot::default()
            .with_playback_state(PlaybackState::Ready)
            .with_play_when_ready(true);
        let failed = snapshot
            .apply(&FieldChange::PlayerError(Some(PlayerError::new(3, "decoder failed"))))
            .unwrap();

        assert!(!failed.is_playing());
        assert_eq!(failed.player_error().map(|e| e.code), Some(3));
        assert_eq!(failed.playback_state(), PlaybackState::Ready);

        let recovered = failed.apply(&FieldChange::PlayerError(None)).unwrap();
        assert!(recovered.is_playing());
    }

    #[test]
    fn test_serde_round_trip_validates() {
        let snapshot = Snapshot::default()
            .with_timeline(two_items(), Some(0))
            .unwrap()
            .with_version(7);
        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);

        let invalid = json.replace("\"current_index\":0", "\"current_index\":9");
        assert!(serde_json::from_str::<Snapshot>(&invalid).is_err());
    }
}
