//! Property-based tests for capability filtering and the change engine

use proptest::prelude::*;

use session_model::{
    filter, CapabilitySet, ChangeEngine, ChangeEvent, Cue, Extras, FieldTag, MediaItem,
    MediaMetadata, PlaybackState, PlayerCommand, PlayerCommands, PlayerError, PositionInfo, RepeatMode,
    SessionCommands, Snapshot, Timeline,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn playback_state_strategy() -> impl Strategy<Value = PlaybackState> {
    prop_oneof![
        Just(PlaybackState::Idle),
        Just(PlaybackState::Buffering),
        Just(PlaybackState::Ready),
        Just(PlaybackState::Ended),
    ]
}

fn repeat_mode_strategy() -> impl Strategy<Value = RepeatMode> {
    prop_oneof![Just(RepeatMode::Off), Just(RepeatMode::One), Just(RepeatMode::All)]
}

/// Commands drawn from a small pool so gating commands flip often
fn commands_strategy() -> impl Strategy<Value = PlayerCommands> {
    any::<u64>().prop_map(|bits| {
        let gated = [
            PlayerCommand::GetTimeline,
            PlayerCommand::GetCurrentItem,
            PlayerCommand::GetMetadata,
            PlayerCommand::GetText,
            PlayerCommand::GetVolume,
            PlayerCommand::GetDeviceVolume,
            PlayerCommand::PlayPause,
        ];
        gated
            .iter()
            .enumerate()
            .filter(|(i, _)| bits & (1 << i) != 0)
            .map(|(_, command)| *command)
            .collect()
    })
}

fn capabilities_strategy() -> impl Strategy<Value = CapabilitySet> {
    commands_strategy().prop_map(|player| CapabilitySet::new(player, SessionCommands::predefined()))
}

fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
    (
        prop::collection::vec("[a-d]", 0..4),
        any::<prop::sample::Index>(),
        playback_state_strategy(),
        any::<bool>(),
        repeat_mode_strategy(),
        any::<bool>(),
        prop::option::of("[A-Z][a-z]{0,5}"),
        0u64..10_000,
        prop::collection::vec("[a-z]{1,4}", 0..2),
        prop::option::of(0i64..3),
        commands_strategy(),
        prop::option::of(1i32..3),
    )
        .prop_map(
            |(ids, index, state, play_when_ready, repeat, shuffle, title, position, cues, extra, player, error)| {
                let items: Vec<MediaItem> = ids
                    .iter()
                    .map(|id| MediaItem::titled(id.clone(), id.to_uppercase()))
                    .collect();
                let current_index = if items.is_empty() {
                    None
                } else {
                    Some(index.index(items.len()))
                };
                let extras = match extra {
                    Some(value) => Extras::new().with("k", value),
                    None => Extras::new(),
                };

                Snapshot::builder()
                    .timeline(Timeline::new(items))
                    .current_index(current_index)
                    .playback_state(state)
                    .play_when_ready(play_when_ready)
                    .repeat_mode(repeat)
                    .shuffle_enabled(shuffle)
                    .metadata(MediaMetadata {
                        title,
                        ..Default::default()
                    })
                    .position(PositionInfo::new(position, None, position))
                    .cues(cues.into_iter().map(Cue::new).collect())
                    .extras(extras)
                    .player_error(error.map(|code| PlayerError::new(code, "failed")))
                    .available_commands(CapabilitySet::new(player, SessionCommands::empty()))
                    .build()
                    .unwrap()
            },
        )
}

/// Tags of every filtered field that differs between the two snapshots
fn differing_fields(previous: &Snapshot, next: &Snapshot) -> Vec<FieldTag> {
    let mut tags = Vec::new();
    if previous.timeline() != next.timeline() {
        tags.push(FieldTag::Timeline);
    }
    if previous.current_index() != next.current_index() || previous.current_item() != next.current_item() {
        tags.push(FieldTag::CurrentItem);
    }
    if previous.metadata() != next.metadata() {
        tags.push(FieldTag::Metadata);
    }
    if previous.position() != next.position() {
        tags.push(FieldTag::Position);
    }
    if previous.playback_state() != next.playback_state() {
        tags.push(FieldTag::PlaybackState);
    }
    if previous.play_when_ready() != next.play_when_ready() {
        tags.push(FieldTag::PlayWhenReady);
    }
    if previous.suppression() != next.suppression() {
        tags.push(FieldTag::Suppression);
    }
    if previous.player_error() != next.player_error() {
        tags.push(FieldTag::PlayerError);
    }
    if previous.parameters() != next.parameters() {
        tags.push(FieldTag::PlaybackParameters);
    }
    if previous.repeat_mode() != next.repeat_mode() {
        tags.push(FieldTag::RepeatMode);
    }
    if previous.shuffle_enabled() != next.shuffle_enabled() {
        tags.push(FieldTag::Shuffle);
    }
    if previous.available_commands() != next.available_commands() {
        tags.push(FieldTag::AvailableCommands);
    }
    if previous.device() != next.device() {
        tags.push(FieldTag::Device);
    }
    if previous.cues() != next.cues() {
        tags.push(FieldTag::Cues);
    }
    if previous.custom_layout() != next.custom_layout() {
        tags.push(FieldTag::CustomLayout);
    }
    if previous.extras() != next.extras() {
        tags.push(FieldTag::Extras);
    }
    tags
}

fn field_tags(events: &[ChangeEvent]) -> Vec<FieldTag> {
    events
        .iter()
        .filter_map(|event| match event {
            ChangeEvent::Field(change) => Some(change.tag()),
            ChangeEvent::Events(_) => None,
        })
        .collect()
}

/// Snapshots with at least two items whose player reports GetTimeline
fn multi_item_snapshot_strategy() -> impl Strategy<Value = Snapshot> {
    (
        snapshot_strategy(),
        prop::collection::vec("[a-d]", 2..5),
        any::<prop::sample::Index>(),
    )
        .prop_map(|(snapshot, ids, index)| {
            let items: Vec<MediaItem> = ids
                .iter()
                .map(|id| MediaItem::titled(id.clone(), id.to_uppercase()))
                .collect();
            let current_index = Some(index.index(items.len()));
            let reported = snapshot.available_commands();
            snapshot
                .to_builder()
                .timeline(Timeline::new(items))
                .current_index(current_index)
                .available_commands(CapabilitySet::new(
                    reported.player.with(PlayerCommand::GetTimeline),
                    reported.session.clone(),
                ))
                .build()
                .unwrap()
        })
}

/// Controller capabilities that include GetTimeline
fn timeline_capabilities_strategy() -> impl Strategy<Value = CapabilitySet> {
    capabilities_strategy()
        .prop_map(|caps| CapabilitySet::new(caps.player.with(PlayerCommand::GetTimeline), caps.session))
}

// ============================================================================
// Diff reports exactly the visible changes
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Field tags equal the set of filtered fields whose values differ, and
    /// the aggregate is present exactly when there is at least one field.
    #[test]
    fn prop_diff_tags_match_differing_fields(
        previous in snapshot_strategy(),
        next in snapshot_strategy(),
        caps in capabilities_strategy(),
    ) {
        let events = ChangeEngine::diff(&previous, &next, &caps);

        let mut reported = field_tags(&events);
        reported.sort();
        let expected = differing_fields(&filter(&previous, &caps), &filter(&next, &caps));
        prop_assert_eq!(&reported, &expected);

        let aggregates: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                ChangeEvent::Events(set) => Some(set.clone()),
                ChangeEvent::Field(_) => None,
            })
            .collect();

        if expected.is_empty() {
            prop_assert!(events.is_empty());
        } else {
            prop_assert_eq!(aggregates.len(), 1);
            prop_assert!(!aggregates[0].is_empty());
            let delivered = field_tags(&events);
            prop_assert_eq!(aggregates[0].as_slice(), delivered.as_slice());
            prop_assert!(matches!(events.last(), Some(ChangeEvent::Events(_))));
        }
    }

    /// Field events come in canonical order, available commands first
    #[test]
    fn prop_diff_order_is_canonical(
        previous in snapshot_strategy(),
        next in snapshot_strategy(),
        caps in capabilities_strategy(),
    ) {
        let tags = field_tags(&ChangeEngine::diff(&previous, &next, &caps));
        let rest: Vec<FieldTag> = tags
            .iter()
            .copied()
            .filter(|tag| *tag != FieldTag::AvailableCommands)
            .collect();

        if tags.contains(&FieldTag::AvailableCommands) {
            prop_assert_eq!(tags[0], FieldTag::AvailableCommands);
        }
        let mut sorted = rest.clone();
        sorted.sort();
        prop_assert_eq!(rest, sorted);
    }

    /// Withdrawing GetTimeline from a controller that saw a multi-item
    /// timeline yields [AvailableCommands, .., Timeline, ..] and at most one item
    #[test]
    fn prop_timeline_withdrawal_cycle(
        snapshot in multi_item_snapshot_strategy(),
        caps in timeline_capabilities_strategy(),
    ) {
        let before = filter(&snapshot, &caps);
        let after = filter(&snapshot, &caps.without_player(PlayerCommand::GetTimeline));
        let tags = field_tags(&ChangeEngine::diff_filtered(&before, &after));

        prop_assert_eq!(before.timeline().len(), snapshot.timeline().len());
        prop_assert_eq!(tags.first().copied(), Some(FieldTag::AvailableCommands));
        prop_assert!(tags.contains(&FieldTag::Timeline));
        prop_assert!(after.timeline().len() <= 1);
    }

    #[test]
    fn prop_filter_is_idempotent(
        snapshot in snapshot_strategy(),
        caps in capabilities_strategy(),
    ) {
        let once = filter(&snapshot, &caps);
        prop_assert_eq!(filter(&once, &caps), once);
    }

    /// Applying a cycle to the previous filtered snapshot reproduces the next one
    #[test]
    fn prop_cycle_reconstructs_next(
        previous in snapshot_strategy(),
        next in snapshot_strategy(),
        caps in capabilities_strategy(),
    ) {
        let previous = filter(&previous, &caps);
        let next = filter(&next, &caps);
        let cycle = ChangeEngine::cycle(&previous, &next);

        let rebuilt = previous
            .apply_all(&cycle.changes)
            .unwrap()
            .with_version(cycle.version);
        prop_assert_eq!(rebuilt, next);
    }
}
