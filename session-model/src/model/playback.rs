//! Playback state, play intent and position types

use serde::{Deserialize, Serialize};

use super::Extras;

/// Coarse state of the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No media prepared
    #[default]
    Idle,
    /// Waiting for data before playback can continue
    Buffering,
    /// Able to play immediately
    Ready,
    /// Reached the end of the timeline
    Ended,
}

/// Why playback is not progressing although play was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SuppressionReason {
    #[default]
    None,
    /// Audio focus temporarily taken by another app
    TransientAudioFocusLoss,
    /// No suitable audio output is connected
    UnsuitableAudioOutput,
}

impl SuppressionReason {
    pub fn is_suppressed(&self) -> bool {
        *self != SuppressionReason::None
    }
}

/// Playback speed and pitch multipliers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackParameters {
    pub speed: f32,
    pub pitch: f32,
}

impl PlaybackParameters {
    pub const DEFAULT: PlaybackParameters = PlaybackParameters {
        speed: 1.0,
        pitch: 1.0,
    };

    pub fn new(speed: f32, pitch: f32) -> Self {
        Self { speed, pitch }
    }

    /// Speed changed, pitch kept
    pub fn with_speed(self, speed: f32) -> Self {
        Self { speed, ..self }
    }

    pub fn is_valid(&self) -> bool {
        self.speed.is_finite() && self.speed > 0.0 && self.pitch.is_finite() && self.pitch > 0.0
    }
}

impl Default for PlaybackParameters {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RepeatMode {
    #[default]
    Off,
    /// Repeat the current item
    One,
    /// Repeat the whole timeline
    All,
}

/// Why the position jumped rather than advancing continuously
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscontinuityReason {
    /// Playback moved to the next item on its own
    AutoTransition,
    /// A seek was requested
    Seek,
    /// The playing item was removed
    Remove,
    /// Player-internal adjustment
    Internal,
}

/// Error that stopped the player
///
/// While set, the player is in an error state whatever its
/// [`PlaybackState`] says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerError {
    pub code: i32,
    pub message: String,
    pub extras: Extras,
}

impl PlayerError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            extras: Extras::new(),
        }
    }

    pub fn with_extras(mut self, extras: Extras) -> Self {
        self.extras = extras;
        self
    }
}

/// Position figures for the current item, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PositionInfo {
    pub position_ms: u64,
    /// `None` while the duration is unknown
    pub duration_ms: Option<u64>,
    pub buffered_position_ms: u64,
    /// Cause of the most recent jump, if the position did not advance continuously
    pub discontinuity: Option<DiscontinuityReason>,
}

impl PositionInfo {
    pub fn new(position_ms: u64, duration_ms: Option<u64>, buffered_position_ms: u64) -> Self {
        Self {
            position_ms,
            duration_ms,
            buffered_position_ms,
            discontinuity: None,
        }
    }

    pub fn with_discontinuity(mut self, reason: DiscontinuityReason) -> Self {
        self.discontinuity = Some(reason);
        self
    }

    /// Figures clamped to the duration when it is known
    pub(crate) fn clamped(self) -> Self {
        match self.duration_ms {
            Some(duration) => Self {
                position_ms: self.position_ms.min(duration),
                buffered_position_ms: self.buffered_position_ms.min(duration),
                ..self
            },
            None => self,
        }
    }
}
