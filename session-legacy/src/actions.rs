//! Legacy action bitmask and its conversion to and from player commands

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use session_model::{CapabilitySet, PlayerCommand, PlayerCommands, SessionCommand, SessionCommandCode};

/// Bitmask of actions a legacy peer may invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegacyActions(u64);

impl LegacyActions {
    pub const NONE: LegacyActions = LegacyActions(0);
    pub const STOP: LegacyActions = LegacyActions(1 << 0);
    pub const PAUSE: LegacyActions = LegacyActions(1 << 1);
    pub const PLAY: LegacyActions = LegacyActions(1 << 2);
    pub const REWIND: LegacyActions = LegacyActions(1 << 3);
    pub const SKIP_TO_PREVIOUS: LegacyActions = LegacyActions(1 << 4);
    pub const SKIP_TO_NEXT: LegacyActions = LegacyActions(1 << 5);
    pub const FAST_FORWARD: LegacyActions = LegacyActions(1 << 6);
    pub const SET_RATING: LegacyActions = LegacyActions(1 << 7);
    pub const SEEK_TO: LegacyActions = LegacyActions(1 << 8);
    pub const PLAY_PAUSE: LegacyActions = LegacyActions(1 << 9);
    pub const PLAY_FROM_MEDIA_ID: LegacyActions = LegacyActions(1 << 10);
    pub const PLAY_FROM_SEARCH: LegacyActions = LegacyActions(1 << 11);
    pub const SKIP_TO_QUEUE_ITEM: LegacyActions = LegacyActions(1 << 12);
    pub const PLAY_FROM_URI: LegacyActions = LegacyActions(1 << 13);
    pub const PREPARE: LegacyActions = LegacyActions(1 << 14);
    pub const PREPARE_FROM_MEDIA_ID: LegacyActions = LegacyActions(1 << 15);
    pub const PREPARE_FROM_SEARCH: LegacyActions = LegacyActions(1 << 16);
    pub const PREPARE_FROM_URI: LegacyActions = LegacyActions(1 << 17);
    pub const SET_REPEAT_MODE: LegacyActions = LegacyActions(1 << 18);
    pub const SET_SHUFFLE_MODE_ENABLED: LegacyActions = LegacyActions(1 << 19);
    pub const SET_SHUFFLE_MODE: LegacyActions = LegacyActions(1 << 21);
    pub const SET_PLAYBACK_SPEED: LegacyActions = LegacyActions(1 << 22);

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// True if every bit of `other` is set
    pub const fn contains(&self, other: LegacyActions) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is set
    pub const fn intersects(&self, other: LegacyActions) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Actions backed by the allowed commands in `capabilities`
    ///
    /// `SET_RATING` is only advertised when the rating session command is
    /// granted.
    pub fn from_commands(capabilities: &CapabilitySet) -> Self {
        let mut actions = capabilities
            .player
            .iter()
            .fold(LegacyActions::NONE, |actions, command| actions | Self::for_command(command));

        if capabilities
            .session
            .contains(&SessionCommand::Predefined(SessionCommandCode::SetRating))
        {
            actions |= LegacyActions::SET_RATING;
        }
        actions
    }

    /// Actions backed by a single player command
    pub fn for_command(command: PlayerCommand) -> Self {
        match command {
            PlayerCommand::PlayPause => Self::PAUSE | Self::PLAY | Self::PLAY_PAUSE,
            PlayerCommand::Prepare => Self::PREPARE,
            PlayerCommand::SeekBack => Self::REWIND,
            PlayerCommand::SeekForward => Self::FAST_FORWARD,
            PlayerCommand::SeekInCurrentItem => Self::SEEK_TO,
            PlayerCommand::SeekToItem => Self::SKIP_TO_QUEUE_ITEM,
            PlayerCommand::SeekToNext | PlayerCommand::SeekToNextItem => Self::SKIP_TO_NEXT,
            PlayerCommand::SeekToPrevious | PlayerCommand::SeekToPreviousItem => {
                Self::SKIP_TO_PREVIOUS
            }
            PlayerCommand::SetMediaItem => {
                Self::PLAY_FROM_MEDIA_ID
                    | Self::PLAY_FROM_SEARCH
                    | Self::PLAY_FROM_URI
                    | Self::PREPARE_FROM_MEDIA_ID
                    | Self::PREPARE_FROM_SEARCH
                    | Self::PREPARE_FROM_URI
            }
            PlayerCommand::SetRepeatMode => Self::SET_REPEAT_MODE,
            PlayerCommand::SetSpeedAndPitch => Self::SET_PLAYBACK_SPEED,
            PlayerCommand::SetShuffleMode => Self::SET_SHUFFLE_MODE | Self::SET_SHUFFLE_MODE_ENABLED,
            PlayerCommand::Stop => Self::STOP,
            PlayerCommand::SeekToDefaultPosition
            | PlayerCommand::GetCurrentItem
            | PlayerCommand::GetTimeline
            | PlayerCommand::GetMetadata
            | PlayerCommand::SetMetadata
            | PlayerCommand::ChangeMediaItems
            | PlayerCommand::GetVolume
            | PlayerCommand::SetVolume
            | PlayerCommand::GetDeviceVolume
            | PlayerCommand::SetDeviceVolume
            | PlayerCommand::AdjustDeviceVolume
            | PlayerCommand::GetText
            | PlayerCommand::Release => Self::NONE,
        }
    }

    /// Player commands implied by a legacy peer's advertised actions
    ///
    /// Read access commands are always granted since legacy peers expose
    /// their full state. `handles_queue` mirrors the legacy "handles queue
    /// commands" session flag.
    pub fn to_player_commands(
        actions: LegacyActions,
        volume_control: VolumeControl,
        handles_queue: bool,
    ) -> PlayerCommands {
        let mut commands = PlayerCommands::empty();
        let mut grant = |condition: bool, granted: &[PlayerCommand]| {
            if condition {
                for command in granted {
                    commands = commands.with(*command);
                }
            }
        };

        grant(
            actions.contains(Self::PLAY | Self::PAUSE) || actions.contains(Self::PLAY_PAUSE),
            &[PlayerCommand::PlayPause],
        );
        grant(actions.contains(Self::PREPARE), &[PlayerCommand::Prepare]);
        // Both the play and prepare flavour are needed to set an item
        grant(
            actions.contains(Self::PLAY_FROM_MEDIA_ID | Self::PREPARE_FROM_MEDIA_ID)
                || actions.contains(Self::PLAY_FROM_SEARCH | Self::PREPARE_FROM_SEARCH)
                || actions.contains(Self::PLAY_FROM_URI | Self::PREPARE_FROM_URI),
            &[PlayerCommand::SetMediaItem, PlayerCommand::Prepare],
        );
        grant(actions.contains(Self::REWIND), &[PlayerCommand::SeekBack]);
        grant(actions.contains(Self::FAST_FORWARD), &[PlayerCommand::SeekForward]);
        grant(
            actions.contains(Self::SEEK_TO),
            &[PlayerCommand::SeekInCurrentItem, PlayerCommand::SeekToDefaultPosition],
        );
        grant(
            actions.contains(Self::SKIP_TO_NEXT),
            &[PlayerCommand::SeekToNext, PlayerCommand::SeekToNextItem],
        );
        grant(
            actions.contains(Self::SKIP_TO_PREVIOUS),
            &[PlayerCommand::SeekToPrevious, PlayerCommand::SeekToPreviousItem],
        );
        grant(actions.contains(Self::SET_PLAYBACK_SPEED), &[PlayerCommand::SetSpeedAndPitch]);
        grant(actions.contains(Self::STOP), &[PlayerCommand::Stop]);
        grant(actions.contains(Self::SET_REPEAT_MODE), &[PlayerCommand::SetRepeatMode]);
        grant(actions.contains(Self::SET_SHUFFLE_MODE), &[PlayerCommand::SetShuffleMode]);

        match volume_control {
            VolumeControl::Fixed => {}
            VolumeControl::Relative => grant(true, &[PlayerCommand::AdjustDeviceVolume]),
            VolumeControl::Absolute => grant(
                true,
                &[PlayerCommand::AdjustDeviceVolume, PlayerCommand::SetDeviceVolume],
            ),
        }

        grant(
            true,
            &[
                PlayerCommand::GetDeviceVolume,
                PlayerCommand::GetTimeline,
                PlayerCommand::GetMetadata,
                PlayerCommand::GetCurrentItem,
            ],
        );

        if handles_queue {
            grant(true, &[PlayerCommand::ChangeMediaItems]);
            grant(actions.contains(Self::SKIP_TO_QUEUE_ITEM), &[PlayerCommand::SeekToItem]);
        }

        commands
    }
}

impl BitOr for LegacyActions {
    type Output = LegacyActions;

    fn bitor(self, rhs: LegacyActions) -> LegacyActions {
        LegacyActions(self.0 | rhs.0)
    }
}

impl BitOrAssign for LegacyActions {
    fn bitor_assign(&mut self, rhs: LegacyActions) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for LegacyActions {
    type Output = LegacyActions;

    fn bitand(self, rhs: LegacyActions) -> LegacyActions {
        LegacyActions(self.0 & rhs.0)
    }
}

impl fmt::Display for LegacyActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// How a remote device's volume can be driven by a legacy peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeControl {
    /// Volume cannot be changed
    Fixed,
    /// Only up/down steps
    Relative,
    /// Steps and absolute values
    Absolute,
}

impl VolumeControl {
    /// Volume control type for the given allowed commands
    pub fn from_commands(commands: &PlayerCommands) -> Self {
        if !commands.contains(PlayerCommand::AdjustDeviceVolume) {
            VolumeControl::Fixed
        } else if commands.contains(PlayerCommand::SetDeviceVolume) {
            VolumeControl::Absolute
        } else {
            VolumeControl::Relative
        }
    }
}
