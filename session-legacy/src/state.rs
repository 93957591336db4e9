//! Legacy composite playback state
//!
//! The legacy API has a single state enum where the modern model has several
//! independent fields. The mapping is a decision table:
//!
//! | player error | playback state | play_when_ready | suppressed | hide suppression | legacy      | reported speed |
//! |--------------|----------------|-----------------|------------|------------------|-------------|----------------|
//! | set          | any            | any             | any        | any              | Error       | 0              |
//! | unset        | Idle           | any             | any        | any              | None        | 0              |
//! | unset        | Ended          | any             | any        | any              | Stopped     | 0              |
//! | unset        | Ready          | false           | any        | any              | Paused      | 0              |
//! | unset        | Buffering      | false           | any        | any              | Paused      | 0              |
//! | unset        | Ready          | true            | no         | any              | Playing     | speed          |
//! | unset        | Buffering      | true            | no         | any              | Buffering   | 0              |
//! | unset        | Ready          | true            | yes        | false            | Paused      | 0              |
//! | unset        | Buffering      | true            | yes        | false            | Paused      | 0              |
//! | unset        | Ready          | true            | yes        | true             | Playing     | 0              |
//! | unset        | Buffering      | true            | yes        | true             | Buffering   | 0              |

use serde::{Deserialize, Serialize};

use session_model::{PlaybackState, SuppressionReason};

/// Legacy single-enum playback state
///
/// There is no ended state; a finished timeline reports `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegacyPlaybackState {
    None,
    Stopped,
    Paused,
    Playing,
    Buffering,
    /// The player reported an error
    Error,
}

impl LegacyPlaybackState {
    /// Wire code used by legacy peers
    pub fn code(&self) -> i32 {
        match self {
            LegacyPlaybackState::None => 0,
            LegacyPlaybackState::Stopped => 1,
            LegacyPlaybackState::Paused => 2,
            LegacyPlaybackState::Playing => 3,
            LegacyPlaybackState::Buffering => 6,
            LegacyPlaybackState::Error => 7,
        }
    }
}

/// Outcome of the decision table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateDecision {
    pub state: LegacyPlaybackState,
    /// Whether the real playback speed may be reported; false forces 0
    pub report_speed: bool,
}

/// Derive the legacy state from the modern fields
///
/// A player error overrides everything else.
pub fn decide(
    has_error: bool,
    playback_state: PlaybackState,
    play_when_ready: bool,
    suppression: SuppressionReason,
    hide_suppression: bool,
) -> StateDecision {
    use LegacyPlaybackState as Legacy;

    let suppressed = suppression.is_suppressed();
    if has_error {
        return StateDecision {
            state: Legacy::Error,
            report_speed: false,
        };
    }

    let (state, report_speed) = match (playback_state, play_when_ready, suppressed, hide_suppression) {
        (PlaybackState::Idle, ..) => (Legacy::None, false),
        (PlaybackState::Ended, ..) => (Legacy::Stopped, false),
        (PlaybackState::Ready | PlaybackState::Buffering, false, _, _) => (Legacy::Paused, false),
        (PlaybackState::Ready, true, false, _) => (Legacy::Playing, true),
        (PlaybackState::Buffering, true, false, _) => (Legacy::Buffering, false),
        (PlaybackState::Ready | PlaybackState::Buffering, true, true, false) => (Legacy::Paused, false),
        (PlaybackState::Ready, true, true, true) => (Legacy::Playing, false),
        (PlaybackState::Buffering, true, true, true) => (Legacy::Buffering, false),
    };

    StateDecision {
        state,
        report_speed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            LegacyPlaybackState::None.code(),
            LegacyPlaybackState::Stopped.code(),
            LegacyPlaybackState::Paused.code(),
            LegacyPlaybackState::Playing.code(),
            LegacyPlaybackState::Buffering.code(),
            LegacyPlaybackState::Error.code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_ended_never_reports_playing() {
        for play_when_ready in [false, true] {
            let decision = decide(false, PlaybackState::Ended, play_when_ready, SuppressionReason::None, false);
            assert_eq!(decision.state, LegacyPlaybackState::Stopped);
        }
    }

    #[test]
    fn test_error_overrides_every_state() {
        for playback_state in [
            PlaybackState::Idle,
            PlaybackState::Buffering,
            PlaybackState::Ready,
            PlaybackState::Ended,
        ] {
            let decision = decide(true, playback_state, true, SuppressionReason::None, true);
            assert_eq!(decision.state, LegacyPlaybackState::Error);
            assert!(!decision.report_speed);
        }
        assert_eq!(LegacyPlaybackState::Error.code(), 7);
    }
}
