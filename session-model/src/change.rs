//! Change events produced by diffing two snapshots
//!
//! One delivery cycle is a list of [`ChangeEvent::Field`] entries followed by
//! a single trailing [`ChangeEvent::Events`] carrying the tags of every field
//! reported in that cycle, in delivery order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::commands::CapabilitySet;
use crate::model::{
    CommandButton, Cue, DeviceState, Extras, MediaItem, MediaMetadata, PlaybackParameters,
    PlaybackState, PlayerError, PositionInfo, RepeatMode, SuppressionReason, Timeline,
};

/// Identifies one snapshot field
///
/// Variant order is the canonical comparison order: dependencies come
/// before the fields that depend on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldTag {
    Timeline,
    CurrentItem,
    Metadata,
    Position,
    PlaybackState,
    PlayWhenReady,
    Suppression,
    PlayerError,
    PlaybackParameters,
    RepeatMode,
    Shuffle,
    AvailableCommands,
    Device,
    Cues,
    CustomLayout,
    Extras,
}

impl FieldTag {
    /// Every tag in canonical order
    pub const ALL: [FieldTag; 16] = [
        FieldTag::Timeline,
        FieldTag::CurrentItem,
        FieldTag::Metadata,
        FieldTag::Position,
        FieldTag::PlaybackState,
        FieldTag::PlayWhenReady,
        FieldTag::Suppression,
        FieldTag::PlayerError,
        FieldTag::PlaybackParameters,
        FieldTag::RepeatMode,
        FieldTag::Shuffle,
        FieldTag::AvailableCommands,
        FieldTag::Device,
        FieldTag::Cues,
        FieldTag::CustomLayout,
        FieldTag::Extras,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldTag::Timeline => "timeline",
            FieldTag::CurrentItem => "current_item",
            FieldTag::Metadata => "metadata",
            FieldTag::Position => "position",
            FieldTag::PlaybackState => "playback_state",
            FieldTag::PlayWhenReady => "play_when_ready",
            FieldTag::Suppression => "suppression",
            FieldTag::PlayerError => "player_error",
            FieldTag::PlaybackParameters => "playback_parameters",
            FieldTag::RepeatMode => "repeat_mode",
            FieldTag::Shuffle => "shuffle",
            FieldTag::AvailableCommands => "available_commands",
            FieldTag::Device => "device",
            FieldTag::Cues => "cues",
            FieldTag::CustomLayout => "custom_layout",
            FieldTag::Extras => "extras",
        }
    }
}

impl fmt::Display for FieldTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// New value of one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldChange {
    Timeline(Timeline),
    /// Item transition; `item` is the new current item for convenience
    CurrentItem {
        index: Option<usize>,
        item: Option<MediaItem>,
    },
    Metadata(MediaMetadata),
    Position(PositionInfo),
    PlaybackState(PlaybackState),
    PlayWhenReady(bool),
    Suppression(SuppressionReason),
    /// `None` once the error is cleared
    PlayerError(Option<PlayerError>),
    PlaybackParameters(PlaybackParameters),
    RepeatMode(RepeatMode),
    Shuffle(bool),
    AvailableCommands(CapabilitySet),
    Device(DeviceState),
    Cues(Vec<Cue>),
    CustomLayout(Vec<CommandButton>),
    Extras(Extras),
}

impl FieldChange {
    pub fn tag(&self) -> FieldTag {
        match self {
            FieldChange::Timeline(_) => FieldTag::Timeline,
            FieldChange::CurrentItem { .. } => FieldTag::CurrentItem,
            FieldChange::Metadata(_) => FieldTag::Metadata,
            FieldChange::Position(_) => FieldTag::Position,
            FieldChange::PlaybackState(_) => FieldTag::PlaybackState,
            FieldChange::PlayWhenReady(_) => FieldTag::PlayWhenReady,
            FieldChange::Suppression(_) => FieldTag::Suppression,
            FieldChange::PlayerError(_) => FieldTag::PlayerError,
            FieldChange::PlaybackParameters(_) => FieldTag::PlaybackParameters,
            FieldChange::RepeatMode(_) => FieldTag::RepeatMode,
            FieldChange::Shuffle(_) => FieldTag::Shuffle,
            FieldChange::AvailableCommands(_) => FieldTag::AvailableCommands,
            FieldChange::Device(_) => FieldTag::Device,
            FieldChange::Cues(_) => FieldTag::Cues,
            FieldChange::CustomLayout(_) => FieldTag::CustomLayout,
            FieldChange::Extras(_) => FieldTag::Extras,
        }
    }
}

/// Duplicate-free tags of one cycle, in delivery order
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventSet(Vec<FieldTag>);

impl EventSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `tag` unless already present
    pub fn push(&mut self, tag: FieldTag) {
        if !self.0.contains(&tag) {
            self.0.push(tag);
        }
    }

    pub fn contains(&self, tag: FieldTag) -> bool {
        self.0.contains(&tag)
    }

    /// True if any of `tags` is present
    pub fn contains_any(&self, tags: &[FieldTag]) -> bool {
        tags.iter().any(|tag| self.contains(*tag))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = FieldTag> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[FieldTag] {
        &self.0
    }
}

impl FromIterator<FieldTag> for EventSet {
    fn from_iter<I: IntoIterator<Item = FieldTag>>(iter: I) -> Self {
        let mut set = EventSet::new();
        for tag in iter {
            set.push(tag);
        }
        set
    }
}

/// One entry of a delivery cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeEvent {
    Field(FieldChange),
    /// Trailing aggregate, never empty
    Events(EventSet),
}

/// The field changes of one delivery cycle for one controller
///
/// The aggregate is derived from `changes` rather than stored, so it cannot
/// disagree with them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    /// Session version the changes bring the controller to
    pub version: u64,
    pub changes: Vec<FieldChange>,
}

impl Cycle {
    pub fn new(version: u64, changes: Vec<FieldChange>) -> Self {
        Self { version, changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Tags of all changes, in order
    pub fn event_set(&self) -> EventSet {
        self.changes.iter().map(FieldChange::tag).collect()
    }

    /// Field events followed by the aggregate; empty for an empty cycle
    pub fn events(&self) -> Vec<ChangeEvent> {
        if self.changes.is_empty() {
            return Vec::new();
        }
        let mut events: Vec<ChangeEvent> = self
            .changes
            .iter()
            .cloned()
            .map(ChangeEvent::Field)
            .collect();
        events.push(ChangeEvent::Events(self.event_set()));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_tag_canonical_order() {
        let mut sorted = FieldTag::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, FieldTag::ALL.to_vec());
        assert!(FieldTag::Timeline < FieldTag::CurrentItem);
        assert!(FieldTag::CurrentItem < FieldTag::Position);
        assert!(FieldTag::CustomLayout < FieldTag::Extras);
        assert!(FieldTag::PlaybackState < FieldTag::PlayerError);
    }

    #[test]
    fn test_event_set_dedups_and_keeps_order() {
        let set: EventSet = [FieldTag::Cues, FieldTag::Timeline, FieldTag::Cues]
            .into_iter()
            .collect();
        assert_eq!(set.as_slice(), &[FieldTag::Cues, FieldTag::Timeline]);
        assert!(set.contains(FieldTag::Timeline));
        assert!(!set.contains(FieldTag::Extras));
    }

    #[test]
    fn test_cycle_events_trailing_aggregate() {
        let cycle = Cycle::new(
            3,
            vec![
                FieldChange::PlayWhenReady(true),
                FieldChange::RepeatMode(RepeatMode::All),
            ],
        );
        let events = cycle.events();
        assert_eq!(events.len(), 3);
        match &events[2] {
            ChangeEvent::Events(set) => {
                assert_eq!(set.as_slice(), &[FieldTag::PlayWhenReady, FieldTag::RepeatMode])
            }
            other => panic!("expected aggregate, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_cycle_has_no_aggregate() {
        assert!(Cycle::new(1, Vec::new()).events().is_empty());
    }
}
