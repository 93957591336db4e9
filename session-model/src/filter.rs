//! Capability filtering
//!
//! Fields gated by a command a controller does not hold degrade to a fixed
//! default rather than disappearing. Whether the player stopped reporting
//! the command or the session withdrew it from the controller, the result
//! is the same because filtering works on the intersection of both.
//!
//! | Missing command    | Effect                                                        |
//! |--------------------|---------------------------------------------------------------|
//! | `GetTimeline`      | timeline collapses to the current item (index 0), or empties  |
//! | `GetCurrentItem`   | position figures reset, current metadata hidden               |
//! | both of the above  | empty timeline, index unset, position reset                   |
//! | `GetMetadata`      | metadata empty                                                |
//! | `GetText`          | cues empty                                                    |
//! | `GetDeviceVolume`  | device volume at the device minimum, unmuted                  |
//! | `GetVolume`        | player volume 1.0                                             |
//!
//! Custom layout buttons bound to a disallowed operation stay in the layout
//! but are disabled.
//! Extras and the player error are never gated.

use crate::commands::{CapabilitySet, PlayerCommand, PlayerCommands};
use crate::model::{Cue, MediaMetadata, PositionInfo, Snapshot, Timeline};

/// Project `snapshot` onto what a holder of `capabilities` may observe
///
/// The result's available commands are the player-reported commands
/// intersected with `capabilities.player`, together with the granted
/// session commands. Filtering is idempotent.
pub fn filter(snapshot: &Snapshot, capabilities: &CapabilitySet) -> Snapshot {
    let effective = CapabilitySet::new(
        snapshot.available_commands.player.intersect(capabilities.player),
        capabilities.session.clone(),
    );
    let commands = effective.player;

    let mut filtered = snapshot.clone();

    let (timeline, current_index) =
        filter_timeline(&snapshot.timeline, snapshot.current_index, &commands);
    filtered.timeline = timeline;
    filtered.current_index = current_index;

    if !commands.contains(PlayerCommand::GetCurrentItem) {
        filtered.position = PositionInfo::default();
        filtered.metadata = MediaMetadata::default();
    }
    filtered.metadata = filter_metadata(&filtered.metadata, &commands);
    filtered.cues = filter_cues(&snapshot.cues, &commands);

    if !commands.contains(PlayerCommand::GetDeviceVolume) {
        filtered.device.volume = filtered.device.info.min_volume;
        filtered.device.muted = false;
    }
    if !commands.contains(PlayerCommand::GetVolume) {
        filtered.device.player_volume = 1.0;
    }

    for button in &mut filtered.custom_layout {
        button.enabled = button.enabled && button.is_allowed_by(&effective);
    }
    filtered.available_commands = effective;

    filtered
}

/// Visible timeline and current index for `commands`
///
/// Without `GetTimeline` the timeline never holds more than the current
/// item, and only when `GetCurrentItem` is held.
pub fn filter_timeline(
    timeline: &Timeline,
    current_index: Option<usize>,
    commands: &PlayerCommands,
) -> (Timeline, Option<usize>) {
    if commands.contains(PlayerCommand::GetTimeline) {
        return (timeline.clone(), current_index);
    }

    let current_item = current_index.and_then(|index| timeline.get(index));
    match current_item {
        Some(item) if commands.contains(PlayerCommand::GetCurrentItem) => {
            (Timeline::single(item.clone()), Some(0))
        }
        _ => (Timeline::empty(), None),
    }
}

/// Metadata, or empty metadata without `GetMetadata`
pub fn filter_metadata(metadata: &MediaMetadata, commands: &PlayerCommands) -> MediaMetadata {
    if commands.contains(PlayerCommand::GetMetadata) {
        metadata.clone()
    } else {
        MediaMetadata::default()
    }
}

/// Cues, or none without `GetText`
pub fn filter_cues(cues: &[Cue], commands: &PlayerCommands) -> Vec<Cue> {
    if commands.contains(PlayerCommand::GetText) {
        cues.to_vec()
    } else {
        Vec::new()
    }
}
