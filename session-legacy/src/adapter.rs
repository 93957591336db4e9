//! Projection of a filtered snapshot onto the legacy state shape

use serde::{Deserialize, Serialize};

use session_model::{
    Extras, MediaMetadata, Operation, PlaybackType, PlayerCommand, SessionCommand, Snapshot,
};

use crate::actions::{LegacyActions, VolumeControl};
use crate::modes::{LegacyRepeatMode, LegacyShuffleMode};
use crate::queue::{
    build_queue, queue_item_id, truncate_by_size, QueueItem, DEFAULT_QUEUE_SIZE_LIMIT_BYTES,
    UNKNOWN_QUEUE_ID,
};
use crate::state::{decide, LegacyPlaybackState};

/// Extras key carrying the true playback speed
pub const EXTRAS_KEY_PLAYBACK_SPEED: &str = "playback_speed";

/// Extras key carrying the current media id
pub const EXTRAS_KEY_MEDIA_ID: &str = "media_id";

/// Position reported when the controller cannot read positions
pub const POSITION_UNKNOWN: i64 = -1;

/// Knobs for the legacy projection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyConfig {
    /// Report suppressed playback as playing (speed 0) instead of paused
    pub hide_play_suppression: bool,
    /// Ceiling for the encoded queue
    pub queue_size_limit_bytes: usize,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            hide_play_suppression: false,
            queue_size_limit_bytes: DEFAULT_QUEUE_SIZE_LIMIT_BYTES,
        }
    }
}

/// Error reported alongside [`LegacyPlaybackState::Error`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyError {
    pub code: i32,
    pub message: String,
}

/// A custom layout button exposed to legacy peers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomAction {
    pub action: String,
    pub display_name: String,
    pub icon_uri: Option<String>,
    pub extras: Extras,
}

/// Everything a legacy peer sees
///
/// Derived from a filtered snapshot on demand and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyState {
    pub state: LegacyPlaybackState,
    /// [`POSITION_UNKNOWN`] without `GetCurrentItem`
    pub position_ms: i64,
    pub buffered_position_ms: u64,
    pub duration_ms: Option<u64>,
    /// Reported speed; 0 unless actually playing
    pub speed: f32,
    pub actions: LegacyActions,
    pub active_queue_item_id: i64,
    pub queue: Vec<QueueItem>,
    pub metadata: MediaMetadata,
    pub repeat_mode: LegacyRepeatMode,
    pub shuffle_mode: LegacyShuffleMode,
    pub custom_actions: Vec<CustomAction>,
    /// `None` for local playback
    pub volume_control: Option<VolumeControl>,
    pub extras: Extras,
    /// Set exactly when `state` is [`LegacyPlaybackState::Error`]
    pub error: Option<LegacyError>,
}

/// Project a capability-filtered snapshot onto the legacy shape
///
/// Pure and deterministic: equal inputs give equal outputs, so callers can
/// skip re-sending an unchanged projection. A player error replaces the
/// playback figures: unknown position, speed 0, no actions and the error's
/// own extras.
pub fn to_legacy(filtered: &Snapshot, config: &LegacyConfig) -> LegacyState {
    let commands = filtered.available_commands().player;
    let can_read_positions = commands.contains(PlayerCommand::GetCurrentItem);
    let has_timeline = commands.contains(PlayerCommand::GetTimeline);

    let decision = decide(
        filtered.player_error().is_some(),
        filtered.playback_state(),
        filtered.play_when_ready(),
        filtered.suppression(),
        config.hide_play_suppression,
    );
    let true_speed = filtered.parameters().speed;
    let speed = if decision.report_speed { true_speed } else { 0.0 };

    let position = filtered.position();
    let (position_ms, buffered_position_ms, duration_ms) = if can_read_positions {
        (
            i64::try_from(position.position_ms).unwrap_or(i64::MAX),
            position.buffered_position_ms,
            position.duration_ms,
        )
    } else {
        (POSITION_UNKNOWN, 0, None)
    };

    // Without GetTimeline the filtered timeline holds at most the current item
    let queue = truncate_by_size(build_queue(filtered.timeline()), config.queue_size_limit_bytes);
    let active_queue_item_id = if has_timeline {
        queue_item_id(filtered.current_index())
    } else {
        UNKNOWN_QUEUE_ID
    };

    let mut extras = filtered.extras().clone();
    extras.insert(EXTRAS_KEY_PLAYBACK_SPEED, true_speed);
    if can_read_positions {
        if let Some(item) = filtered.current_item().filter(|item| !item.media_id.is_empty()) {
            extras.insert(EXTRAS_KEY_MEDIA_ID, item.media_id.clone());
        }
    }

    let volume_control = match filtered.device().info.playback_type {
        PlaybackType::Local => None,
        PlaybackType::Remote => Some(VolumeControl::from_commands(&commands)),
    };

    let state = LegacyState {
        state: decision.state,
        position_ms,
        buffered_position_ms,
        duration_ms,
        speed,
        actions: LegacyActions::from_commands(filtered.available_commands()),
        active_queue_item_id,
        queue,
        metadata: filtered.metadata().clone(),
        repeat_mode: filtered.repeat_mode().into(),
        shuffle_mode: LegacyShuffleMode::from_enabled(filtered.shuffle_enabled()),
        custom_actions: custom_actions(filtered),
        volume_control,
        extras,
        error: None,
    };

    match filtered.player_error() {
        Some(error) => LegacyState {
            position_ms: POSITION_UNKNOWN,
            buffered_position_ms: 0,
            speed: 0.0,
            actions: LegacyActions::NONE,
            active_queue_item_id: UNKNOWN_QUEUE_ID,
            custom_actions: Vec::new(),
            extras: error.extras.clone(),
            error: Some(LegacyError {
                code: error.code,
                message: error.message.clone(),
            }),
            ..state
        },
        None => state,
    }
}

/// Enabled layout buttons bound to custom session commands
fn custom_actions(filtered: &Snapshot) -> Vec<CustomAction> {
    filtered
        .custom_layout()
        .iter()
        .filter(|button| button.enabled && button.is_allowed_by(filtered.available_commands()))
        .filter_map(|button| match &button.operation {
            Operation::Session(SessionCommand::Custom { action }) => Some(CustomAction {
                action: action.clone(),
                display_name: button.display_name.clone(),
                icon_uri: button.icon_uri.clone(),
                extras: button.extras.clone(),
            }),
            _ => None,
        })
        .collect()
}

/// Buffered share of the duration as a percentage in `0..=100`
///
/// Unknown duration gives 0; a zero duration counts as fully buffered.
pub fn buffered_percentage(buffered_position_ms: u64, duration_ms: Option<u64>) -> u8 {
    match duration_ms {
        None => 0,
        Some(0) => 100,
        Some(duration) => {
            let percent = buffered_position_ms.saturating_mul(100) / duration;
            percent.min(100) as u8
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use session_model::{
        filter, CapabilitySet, CommandButton, DeviceInfo, DeviceState, MediaItem, PlaybackParameters,
        PlaybackState, PlayerError, PositionInfo, SessionCommands, SuppressionReason, Timeline,
    };

    fn playing_snapshot() -> Snapshot {
        Snapshot::builder()
            .timeline(Timeline::new(vec![
                MediaItem::titled("song-1", "One"),
                MediaItem::titled("song-2", "Two"),
            ]))
            .current_index(Some(1))
            .position(PositionInfo::new(4_000, Some(200_000), 9_000))
            .playback_state(PlaybackState::Ready)
            .play_when_ready(true)
            .parameters(PlaybackParameters::new(1.5, 1.0))
            .build()
            .unwrap()
    }

    fn project(snapshot: &Snapshot, caps: &CapabilitySet) -> LegacyState {
        to_legacy(&filter(snapshot, caps), &LegacyConfig::default())
    }

    #[test]
    fn test_playing_reports_speed() {
        let legacy = project(&playing_snapshot(), &CapabilitySet::default_for_controller());

        assert_eq!(legacy.state, LegacyPlaybackState::Playing);
        assert_eq!(legacy.speed, 1.5);
        assert_eq!(legacy.position_ms, 4_000);
        assert_eq!(legacy.active_queue_item_id, 1);
        assert_eq!(legacy.queue.len(), 2);
        assert_eq!(legacy.extras.get(EXTRAS_KEY_MEDIA_ID), Some(&Value::from("song-2")));
    }

    #[test]
    fn test_paused_keeps_true_speed_in_extras() {
        let snapshot = playing_snapshot().with_play_when_ready(false);
        let legacy = project(&snapshot, &CapabilitySet::default_for_controller());

        assert_eq!(legacy.state, LegacyPlaybackState::Paused);
        assert_eq!(legacy.speed, 0.0);
        assert_eq!(legacy.extras.get(EXTRAS_KEY_PLAYBACK_SPEED), Some(&Value::from(1.5f32)));
    }

    #[test]
    fn test_hidden_suppression_reports_playing_at_zero_speed() {
        let snapshot = playing_snapshot()
            .to_builder()
            .suppression(SuppressionReason::TransientAudioFocusLoss)
            .build()
            .unwrap();
        let config = LegacyConfig {
            hide_play_suppression: true,
            ..Default::default()
        };

        let legacy = to_legacy(&filter(&snapshot, &CapabilitySet::default_for_controller()), &config);
        assert_eq!(legacy.state, LegacyPlaybackState::Playing);
        assert_eq!(legacy.speed, 0.0);
        assert_eq!(legacy.extras.get(EXTRAS_KEY_PLAYBACK_SPEED), Some(&Value::from(1.5f32)));
    }

    #[test]
    fn test_without_timeline_queue_holds_current_item() {
        let caps = CapabilitySet::default_for_controller().without_player(PlayerCommand::GetTimeline);
        let legacy = project(&playing_snapshot(), &caps);

        assert_eq!(legacy.queue.len(), 1);
        assert_eq!(legacy.queue[0].media_id, "song-2");
        assert_eq!(legacy.active_queue_item_id, UNKNOWN_QUEUE_ID);
        assert_eq!(legacy.extras.get(EXTRAS_KEY_MEDIA_ID), Some(&Value::from("song-2")));
    }

    #[test]
    fn test_player_error_projection() {
        let snapshot = playing_snapshot()
            .to_builder()
            .player_error(Some(
                PlayerError::new(1, "network down").with_extras(Extras::new().with("retry", true)),
            ))
            .build()
            .unwrap();
        let legacy = project(&snapshot, &CapabilitySet::default_for_controller());

        assert_eq!(legacy.state, LegacyPlaybackState::Error);
        assert_eq!(legacy.position_ms, POSITION_UNKNOWN);
        assert_eq!(legacy.buffered_position_ms, 0);
        assert_eq!(legacy.speed, 0.0);
        assert!(legacy.actions.is_empty());
        assert_eq!(legacy.active_queue_item_id, UNKNOWN_QUEUE_ID);
        assert_eq!(
            legacy.error,
            Some(LegacyError {
                code: 1,
                message: "network down".to_string(),
            })
        );
        assert_eq!(legacy.extras, Extras::new().with("retry", true));
        assert_eq!(legacy.queue.len(), 2);
    }

    #[test]
    fn test_cleared_error_restores_playback_figures() {
        let failed = playing_snapshot()
            .to_builder()
            .player_error(Some(PlayerError::new(1, "network down")))
            .build()
            .unwrap();
        let recovered = failed.to_builder().player_error(None).build().unwrap();

        let legacy = project(&recovered, &CapabilitySet::default_for_controller());
        assert_eq!(legacy, project(&playing_snapshot(), &CapabilitySet::default_for_controller()));
        assert_eq!(legacy.error, None);
        assert_eq!(legacy.state, LegacyPlaybackState::Playing);
    }

    #[test]
    fn test_without_current_item_position_unknown() {
        let caps = CapabilitySet::default_for_controller().without_player(PlayerCommand::GetCurrentItem);
        let legacy = project(&playing_snapshot(), &caps);

        assert_eq!(legacy.position_ms, POSITION_UNKNOWN);
        assert_eq!(legacy.buffered_position_ms, 0);
        assert!(!legacy.extras.contains_key(EXTRAS_KEY_MEDIA_ID));
    }

    #[test]
    fn test_actions_follow_capabilities() {
        let caps = CapabilitySet::new(
            PlayerCommand::Stop.into(),
            SessionCommands::empty(),
        );
        let legacy = project(&playing_snapshot(), &caps);
        assert_eq!(legacy.actions, LegacyActions::STOP);
    }

    #[test]
    fn test_custom_actions_only_enabled_custom_buttons() {
        let snapshot = playing_snapshot()
            .to_builder()
            .custom_layout(vec![
                CommandButton::new("Like", SessionCommand::custom("like")),
                CommandButton::new("Hidden", SessionCommand::custom("hidden")).with_enabled(false),
                CommandButton::new("Stop", PlayerCommand::Stop),
            ])
            .build()
            .unwrap();
        let caps = CapabilitySet::default_for_controller().union(&CapabilitySet::new(
            Default::default(),
            SessionCommands::empty()
                .with(SessionCommand::custom("like"))
                .with(SessionCommand::custom("hidden")),
        ));

        let actions: Vec<String> = project(&snapshot, &caps)
            .custom_actions
            .into_iter()
            .map(|action| action.action)
            .collect();
        assert_eq!(actions, vec!["like"]);
    }

    #[test]
    fn test_volume_control_for_remote_devices() {
        let local = project(&playing_snapshot(), &CapabilitySet::default_for_controller());
        assert_eq!(local.volume_control, None);

        let remote = playing_snapshot()
            .to_builder()
            .device(DeviceState::new(
                DeviceInfo {
                    playback_type: PlaybackType::Remote,
                    min_volume: 0,
                    max_volume: 25,
                },
                10,
            ))
            .build()
            .unwrap();
        let caps = CapabilitySet::default_for_controller().without_player(PlayerCommand::SetDeviceVolume);
        assert_eq!(
            project(&remote, &caps).volume_control,
            Some(VolumeControl::Relative)
        );
    }

    #[test]
    fn test_buffered_percentage() {
        assert_eq!(buffered_percentage(5_000, None), 0);
        assert_eq!(buffered_percentage(5_000, Some(0)), 100);
        assert_eq!(buffered_percentage(5_000, Some(10_000)), 50);
        assert_eq!(buffered_percentage(20_000, Some(10_000)), 100);
    }
}
