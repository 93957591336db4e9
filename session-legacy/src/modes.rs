//! Repeat and shuffle mode conversions

use serde::{Deserialize, Serialize};

use session_model::RepeatMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegacyRepeatMode {
    Invalid,
    None,
    One,
    All,
    Group,
}

impl From<RepeatMode> for LegacyRepeatMode {
    fn from(mode: RepeatMode) -> Self {
        match mode {
            RepeatMode::Off => LegacyRepeatMode::None,
            RepeatMode::One => LegacyRepeatMode::One,
            RepeatMode::All => LegacyRepeatMode::All,
        }
    }
}

impl From<LegacyRepeatMode> for RepeatMode {
    fn from(mode: LegacyRepeatMode) -> Self {
        match mode {
            LegacyRepeatMode::Invalid | LegacyRepeatMode::None => RepeatMode::Off,
            LegacyRepeatMode::One => RepeatMode::One,
            LegacyRepeatMode::All | LegacyRepeatMode::Group => RepeatMode::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegacyShuffleMode {
    Invalid,
    None,
    All,
    Group,
}

impl LegacyShuffleMode {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            LegacyShuffleMode::All
        } else {
            LegacyShuffleMode::None
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, LegacyShuffleMode::All | LegacyShuffleMode::Group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_mode_round_trip() {
        for mode in [RepeatMode::Off, RepeatMode::One, RepeatMode::All] {
            assert_eq!(RepeatMode::from(LegacyRepeatMode::from(mode)), mode);
        }
    }

    #[test]
    fn test_legacy_only_repeat_modes() {
        assert_eq!(RepeatMode::from(LegacyRepeatMode::Group), RepeatMode::All);
        assert_eq!(RepeatMode::from(LegacyRepeatMode::Invalid), RepeatMode::Off);
    }

    #[test]
    fn test_shuffle_mode() {
        assert_eq!(LegacyShuffleMode::from_enabled(true), LegacyShuffleMode::All);
        assert!(!LegacyShuffleMode::from_enabled(false).is_enabled());
        assert!(LegacyShuffleMode::Group.is_enabled());
        assert!(!LegacyShuffleMode::Invalid.is_enabled());
    }
}
