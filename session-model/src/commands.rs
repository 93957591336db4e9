//! Capability sets: which player and session operations a controller may use
//!
//! A [`CapabilitySet`] holds two independent collections:
//! - [`PlayerCommands`]: a bit set of [`PlayerCommand`]s (play, seek, set repeat mode, ...)
//! - [`SessionCommands`]: predefined and custom session-level commands
//!
//! Capability sets are plain values. Every mutation returns a new set, so a
//! set handed to a controller can be shared without locking.

use std::collections::BTreeSet;
use std::fmt;

use enumflags2::{bitflags, BitFlags};
use serde::{Deserialize, Serialize};

// ============================================================================
// Player commands
// ============================================================================

/// A single operation on the player
///
/// The `Get*` commands gate read access to state fields; all other
/// commands gate the matching mutation.
#[bitflags]
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlayerCommand {
    PlayPause = 1 << 0,
    Prepare = 1 << 1,
    Stop = 1 << 2,
    SeekToDefaultPosition = 1 << 3,
    SeekInCurrentItem = 1 << 4,
    SeekToPreviousItem = 1 << 5,
    SeekToPrevious = 1 << 6,
    SeekToNextItem = 1 << 7,
    SeekToNext = 1 << 8,
    SeekToItem = 1 << 9,
    SeekBack = 1 << 10,
    SeekForward = 1 << 11,
    SetSpeedAndPitch = 1 << 12,
    SetShuffleMode = 1 << 13,
    SetRepeatMode = 1 << 14,
    GetCurrentItem = 1 << 15,
    GetTimeline = 1 << 16,
    GetMetadata = 1 << 17,
    SetMetadata = 1 << 18,
    SetMediaItem = 1 << 19,
    ChangeMediaItems = 1 << 20,
    GetVolume = 1 << 21,
    SetVolume = 1 << 22,
    GetDeviceVolume = 1 << 23,
    SetDeviceVolume = 1 << 24,
    AdjustDeviceVolume = 1 << 25,
    GetText = 1 << 26,
    Release = 1 << 27,
}

impl PlayerCommand {
    /// Stable snake_case name, used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlayPause => "play_pause",
            Self::Prepare => "prepare",
            Self::Stop => "stop",
            Self::SeekToDefaultPosition => "seek_to_default_position",
            Self::SeekInCurrentItem => "seek_in_current_item",
            Self::SeekToPreviousItem => "seek_to_previous_item",
            Self::SeekToPrevious => "seek_to_previous",
            Self::SeekToNextItem => "seek_to_next_item",
            Self::SeekToNext => "seek_to_next",
            Self::SeekToItem => "seek_to_item",
            Self::SeekBack => "seek_back",
            Self::SeekForward => "seek_forward",
            Self::SetSpeedAndPitch => "set_speed_and_pitch",
            Self::SetShuffleMode => "set_shuffle_mode",
            Self::SetRepeatMode => "set_repeat_mode",
            Self::GetCurrentItem => "get_current_item",
            Self::GetTimeline => "get_timeline",
            Self::GetMetadata => "get_metadata",
            Self::SetMetadata => "set_metadata",
            Self::SetMediaItem => "set_media_item",
            Self::ChangeMediaItems => "change_media_items",
            Self::GetVolume => "get_volume",
            Self::SetVolume => "set_volume",
            Self::GetDeviceVolume => "get_device_volume",
            Self::SetDeviceVolume => "set_device_volume",
            Self::AdjustDeviceVolume => "adjust_device_volume",
            Self::GetText => "get_text",
            Self::Release => "release",
        }
    }
}

impl fmt::Display for PlayerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bit set of [`PlayerCommand`]s
///
/// `contains` is a single mask test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PlayerCommands(BitFlags<PlayerCommand>);

impl PlayerCommands {
    /// The empty set
    pub fn empty() -> Self {
        Self(BitFlags::empty())
    }

    /// Every player command
    pub fn all() -> Self {
        Self(BitFlags::all())
    }

    /// Build from raw bits, dropping unknown bits
    pub fn from_bits_truncate(bits: u64) -> Self {
        Self(BitFlags::from_bits_truncate(bits))
    }

    /// Raw bit representation
    pub fn bits(&self) -> u64 {
        self.0.bits()
    }

    pub fn contains(&self, command: PlayerCommand) -> bool {
        self.0.contains(command)
    }

    /// Copy of this set with `command` added
    pub fn with(mut self, command: PlayerCommand) -> Self {
        self.0.insert(command);
        self
    }

    /// Copy of this set with `command` removed
    pub fn without(mut self, command: PlayerCommand) -> Self {
        self.0.remove(command);
        self
    }

    /// Remove every command in `other`
    pub fn remove(mut self, other: PlayerCommands) -> Self {
        self.0.remove(other.0);
        self
    }

    pub fn union(self, other: PlayerCommands) -> Self {
        Self(self.0 | other.0)
    }

    pub fn intersect(self, other: PlayerCommands) -> Self {
        Self(self.0 & other.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Commands in ascending bit order
    pub fn iter(&self) -> impl Iterator<Item = PlayerCommand> + '_ {
        self.0.iter()
    }
}

impl From<PlayerCommand> for PlayerCommands {
    fn from(command: PlayerCommand) -> Self {
        Self(BitFlags::from_flag(command))
    }
}

impl FromIterator<PlayerCommand> for PlayerCommands {
    fn from_iter<I: IntoIterator<Item = PlayerCommand>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

// ============================================================================
// Session commands
// ============================================================================

/// Predefined session-level operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCommandCode {
    SetRating,
    GetLibraryRoot,
    Search,
}

impl SessionCommandCode {
    pub const ALL: [SessionCommandCode; 3] = [Self::SetRating, Self::GetLibraryRoot, Self::Search];
}

/// A session-level operation
///
/// Custom commands are identified by their action string only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCommand {
    Predefined(SessionCommandCode),
    Custom { action: String },
}

impl SessionCommand {
    /// Create a custom command for an action string
    pub fn custom(action: impl Into<String>) -> Self {
        Self::Custom {
            action: action.into(),
        }
    }

    /// The custom action string, if this is a custom command
    pub fn custom_action(&self) -> Option<&str> {
        match self {
            Self::Custom { action } => Some(action),
            Self::Predefined(_) => None,
        }
    }
}

impl From<SessionCommandCode> for SessionCommand {
    fn from(code: SessionCommandCode) -> Self {
        Self::Predefined(code)
    }
}

/// Ordered set of [`SessionCommand`]s
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SessionCommands(BTreeSet<SessionCommand>);

impl SessionCommands {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// All predefined session commands, no custom ones
    pub fn predefined() -> Self {
        SessionCommandCode::ALL
            .iter()
            .map(|code| SessionCommand::Predefined(*code))
            .collect()
    }

    pub fn contains(&self, command: &SessionCommand) -> bool {
        self.0.contains(command)
    }

    /// Whether a custom command with this action is present
    pub fn contains_action(&self, action: &str) -> bool {
        self.0
            .iter()
            .any(|command| command.custom_action() == Some(action))
    }

    pub fn with(mut self, command: impl Into<SessionCommand>) -> Self {
        self.0.insert(command.into());
        self
    }

    pub fn without(mut self, command: &SessionCommand) -> Self {
        self.0.remove(command);
        self
    }

    pub fn union(mut self, other: &SessionCommands) -> Self {
        self.0.extend(other.0.iter().cloned());
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionCommand> {
        self.0.iter()
    }
}

impl FromIterator<SessionCommand> for SessionCommands {
    fn from_iter<I: IntoIterator<Item = SessionCommand>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// Operation & CapabilitySet
// ============================================================================

/// Anything a controller can ask the session to do
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Player(PlayerCommand),
    Session(SessionCommand),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Player(command) => write!(f, "player:{}", command),
            Operation::Session(SessionCommand::Predefined(code)) => write!(f, "session:{:?}", code),
            Operation::Session(SessionCommand::Custom { action }) => {
                write!(f, "session:custom:{}", action)
            }
        }
    }
}

impl From<PlayerCommand> for Operation {
    fn from(command: PlayerCommand) -> Self {
        Operation::Player(command)
    }
}

impl From<SessionCommand> for Operation {
    fn from(command: SessionCommand) -> Self {
        Operation::Session(command)
    }
}

/// The operations currently permitted for one controller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub player: PlayerCommands,
    pub session: SessionCommands,
}

impl CapabilitySet {
    pub fn new(player: PlayerCommands, session: SessionCommands) -> Self {
        Self { player, session }
    }

    /// No operations at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// The set a session grants when its callback does not narrow it:
    /// every player command and the predefined session commands
    pub fn default_for_controller() -> Self {
        Self {
            player: PlayerCommands::all(),
            session: SessionCommands::predefined(),
        }
    }

    /// Whether `operation` may be exercised on behalf of the holder
    pub fn is_allowed(&self, operation: &Operation) -> bool {
        match operation {
            Operation::Player(command) => self.player.contains(*command),
            Operation::Session(command) => self.session.contains(command),
        }
    }

    pub fn allows_player(&self, command: PlayerCommand) -> bool {
        self.player.contains(command)
    }

    pub fn union(&self, other: &CapabilitySet) -> CapabilitySet {
        CapabilitySet {
            player: self.player.union(other.player),
            session: self.session.clone().union(&other.session),
        }
    }

    /// Copy with the given player commands removed
    pub fn without_player(&self, commands: impl Into<PlayerCommands>) -> CapabilitySet {
        CapabilitySet {
            player: self.player.remove(commands.into()),
            session: self.session.clone(),
        }
    }

    /// Copy with the given session command removed
    pub fn without_session(&self, command: &SessionCommand) -> CapabilitySet {
        CapabilitySet {
            player: self.player,
            session: self.session.clone().without(command),
        }
    }

    /// Copy whose player commands are limited to those in `commands`
    pub fn intersect_player(&self, commands: PlayerCommands) -> CapabilitySet {
        CapabilitySet {
            player: self.player.intersect(commands),
            session: self.session.clone(),
        }
    }
}
