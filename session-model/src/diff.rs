//! Change engine: snapshot pairs in, ordered change events out
//!
//! Both sides are compared after capability filtering, so a change to a
//! field the controller cannot see produces nothing. Fields are compared in
//! [`FieldTag`] order, except that an available-commands change leads the
//! cycle: every gated field depends on it.

use tracing::trace;

use crate::change::{ChangeEvent, Cycle, FieldChange, FieldTag};
use crate::commands::CapabilitySet;
use crate::filter::filter;
use crate::model::Snapshot;

/// Stateless diff entry points
pub struct ChangeEngine;

impl ChangeEngine {
    /// Ordered change events between `previous` and `next` as seen through
    /// `capabilities`
    ///
    /// Returns an empty list when nothing visible changed; otherwise the
    /// field events followed by exactly one aggregate.
    pub fn diff(previous: &Snapshot, next: &Snapshot, capabilities: &CapabilitySet) -> Vec<ChangeEvent> {
        Self::diff_filtered(&filter(previous, capabilities), &filter(next, capabilities))
    }

    /// Like [`ChangeEngine::diff`] for values that are already filtered
    ///
    /// Used when the capabilities differ between the two sides.
    pub fn diff_filtered(previous: &Snapshot, next: &Snapshot) -> Vec<ChangeEvent> {
        Cycle::new(next.version(), Self::field_changes(previous, next)).events()
    }

    /// The cycle bringing `previous` to `next`, both already filtered
    pub fn cycle(previous: &Snapshot, next: &Snapshot) -> Cycle {
        Cycle::new(next.version(), Self::field_changes(previous, next))
    }

    /// Changed fields only, in delivery order
    pub fn field_changes(previous: &Snapshot, next: &Snapshot) -> Vec<FieldChange> {
        let mut changes = Vec::new();

        if previous.available_commands() != next.available_commands() {
            changes.push(FieldChange::AvailableCommands(next.available_commands().clone()));
        }

        for tag in FieldTag::ALL {
            if tag == FieldTag::AvailableCommands {
                continue;
            }
            if let Some(change) = Self::compare(tag, previous, next) {
                changes.push(change);
            }
        }

        trace!(
            "Diff v{} -> v{}: {} field changes",
            previous.version(),
            next.version(),
            changes.len()
        );
        changes
    }

    fn compare(tag: FieldTag, previous: &Snapshot, next: &Snapshot) -> Option<FieldChange> {
        let change = match tag {
            FieldTag::Timeline if previous.timeline() != next.timeline() => {
                FieldChange::Timeline(next.timeline().clone())
            }
            FieldTag::CurrentItem if previous.current_item() != next.current_item()
                || previous.current_index() != next.current_index() =>
            {
                FieldChange::CurrentItem {
                    index: next.current_index(),
                    item: next.current_item().cloned(),
                }
            }
            FieldTag::Metadata if previous.metadata() != next.metadata() => {
                FieldChange::Metadata(next.metadata().clone())
            }
            FieldTag::Position if previous.position() != next.position() => {
                FieldChange::Position(*next.position())
            }
            FieldTag::PlaybackState if previous.playback_state() != next.playback_state() => {
                FieldChange::PlaybackState(next.playback_state())
            }
            FieldTag::PlayWhenReady if previous.play_when_ready() != next.play_when_ready() => {
                FieldChange::PlayWhenReady(next.play_when_ready())
            }
            FieldTag::Suppression if previous.suppression() != next.suppression() => {
                FieldChange::Suppression(next.suppression())
            }
            FieldTag::PlayerError if previous.player_error() != next.player_error() => {
                FieldChange::PlayerError(next.player_error().cloned())
            }
            FieldTag::PlaybackParameters if previous.parameters() != next.parameters() => {
                FieldChange::PlaybackParameters(next.parameters())
            }
            FieldTag::RepeatMode if previous.repeat_mode() != next.repeat_mode() => {
                FieldChange::RepeatMode(next.repeat_mode())
            }
            FieldTag::Shuffle if previous.shuffle_enabled() != next.shuffle_enabled() => {
                FieldChange::Shuffle(next.shuffle_enabled())
            }
            FieldTag::AvailableCommands
                if previous.available_commands() != next.available_commands() =>
            {
                FieldChange::AvailableCommands(next.available_commands().clone())
            }
            FieldTag::Device if previous.device() != next.device() => {
                FieldChange::Device(*next.device())
            }
            FieldTag::Cues if previous.cues() != next.cues() => FieldChange::Cues(next.cues().to_vec()),
            FieldTag::CustomLayout if previous.custom_layout() != next.custom_layout() => {
                FieldChange::CustomLayout(next.custom_layout().to_vec())
            }
            FieldTag::Extras if previous.extras() != next.extras() => {
                FieldChange::Extras(next.extras().clone())
            }
            _ => return None,
        };
        Some(change)
    }
}
