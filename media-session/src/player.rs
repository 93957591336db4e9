//! Player backend seam
//!
//! The session routes every accepted player command to a [`PlayerBackend`]
//! on its worker thread. The backend changes state through the
//! [`PlayerContext`] it is handed; the session turns those changes into one
//! new snapshot version once the command returns.
//!
//! A backend that cannot finish synchronously calls
//! [`PlayerContext::defer`] and reports later through the returned
//! [`CompletionToken`].

use std::sync::mpsc;

use tracing::{debug, warn};

use session_model::{
    DiscontinuityReason, MediaItem, ModelError, Operation, PlaybackState, PlayerCommand,
    PositionInfo, RepeatMode, Snapshot, SnapshotBuilder, Timeline,
};

use crate::protocol::{CommandArgs, CommandRequest, ControllerId, ResultCode};
use crate::session::SessionTask;

// ============================================================================
// Context and completion
// ============================================================================

/// Reports the result of a deferred command
///
/// Dropping the token without calling [`CompletionToken::complete`] reports
/// [`ResultCode::Cancelled`].
#[derive(Debug)]
pub struct CompletionToken {
    tx: mpsc::Sender<SessionTask>,
    controller: ControllerId,
    seq: u64,
    done: bool,
}

impl CompletionToken {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn complete(mut self, result_code: ResultCode) {
        self.send(result_code);
    }

    fn send(&mut self, result_code: ResultCode) {
        self.done = true;
        let task = SessionTask::Complete {
            controller: self.controller.clone(),
            seq: self.seq,
            result_code,
        };
        if self.tx.send(task).is_err() {
            debug!(
                "Session gone before command {} of {} completed",
                self.seq, self.controller
            );
        }
    }
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        if !self.done {
            warn!(
                "Command {} of {} dropped without a result",
                self.seq, self.controller
            );
            self.send(ResultCode::Cancelled);
        }
    }
}

/// Working state handed to a backend for one command
pub struct PlayerContext<'a> {
    snapshot: &'a mut Snapshot,
    changed: bool,
    deferred: bool,
    tx: mpsc::Sender<SessionTask>,
    controller: ControllerId,
    seq: u64,
}

impl<'a> PlayerContext<'a> {
    pub(crate) fn new(
        snapshot: &'a mut Snapshot,
        tx: mpsc::Sender<SessionTask>,
        controller: ControllerId,
        seq: u64,
    ) -> Self {
        Self {
            snapshot,
            changed: false,
            deferred: false,
            tx,
            controller,
            seq,
        }
    }

    /// State as of this command, including updates made so far
    pub fn snapshot(&self) -> &Snapshot {
        self.snapshot
    }

    /// Change state; the snapshot is rebuilt and validated immediately
    pub fn update<F>(&mut self, f: F) -> Result<(), ModelError>
    where
        F: FnOnce(SnapshotBuilder) -> SnapshotBuilder,
    {
        *self.snapshot = f(self.snapshot.to_builder()).build()?;
        self.changed = true;
        Ok(())
    }

    /// Report the result later; the code returned by the backend is ignored
    pub fn defer(&mut self) -> CompletionToken {
        self.deferred = true;
        CompletionToken {
            tx: self.tx.clone(),
            controller: self.controller.clone(),
            seq: self.seq,
            done: false,
        }
    }

    pub fn controller(&self) -> &ControllerId {
        &self.controller
    }

    pub(crate) fn changed(&self) -> bool {
        self.changed
    }

    pub(crate) fn is_deferred(&self) -> bool {
        self.deferred
    }
}

/// Realizes accepted player commands
pub trait PlayerBackend: Send {
    fn execute(&mut self, request: &CommandRequest, player: &mut PlayerContext<'_>) -> ResultCode;
}

// ============================================================================
// SimplePlayer
// ============================================================================

/// Distance of a `SeekBack`
pub const SEEK_BACK_INCREMENT_MS: u64 = 5_000;

/// Distance of a `SeekForward`
pub const SEEK_FORWARD_INCREMENT_MS: u64 = 15_000;

/// Past this position `SeekToPrevious` restarts the current item
pub const MAX_SEEK_TO_PREVIOUS_POSITION_MS: u64 = 3_000;

/// In-memory backend that applies commands directly to the snapshot
///
/// Plays nothing; positions only move when commanded.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplePlayer;

impl SimplePlayer {
    pub fn new() -> Self {
        Self
    }

    fn apply(
        &mut self,
        command: PlayerCommand,
        args: &CommandArgs,
        player: &mut PlayerContext<'_>,
    ) -> Result<ResultCode, ModelError> {
        let snapshot = player.snapshot().clone();

        match (command, args) {
            (PlayerCommand::PlayPause, CommandArgs::PlayWhenReady(play)) => {
                let play = *play;
                player.update(|b| {
                    let b = b.play_when_ready(play);
                    match (play, snapshot.playback_state()) {
                        (true, PlaybackState::Ended) => b
                            .position(restart(snapshot.position()))
                            .playback_state(PlaybackState::Ready),
                        (true, PlaybackState::Idle) if !snapshot.timeline().is_empty() => {
                            b.playback_state(PlaybackState::Ready)
                        }
                        _ => b,
                    }
                })?;
            }
            // Preparing again also retries after a player error
            (PlayerCommand::Prepare, CommandArgs::None) => {
                if snapshot.playback_state() == PlaybackState::Idle
                    || snapshot.player_error().is_some()
                {
                    let state = if snapshot.timeline().is_empty() {
                        PlaybackState::Ended
                    } else {
                        PlaybackState::Ready
                    };
                    player.update(|b| b.player_error(None).playback_state(state))?;
                }
            }
            (PlayerCommand::Stop, CommandArgs::None) => {
                player.update(|b| {
                    b.play_when_ready(false)
                        .playback_state(PlaybackState::Idle)
                        .position(restart(snapshot.position()))
                })?;
            }
            (PlayerCommand::Release, CommandArgs::None) => {
                player.update(|b| b.play_when_ready(false).playback_state(PlaybackState::Idle))?;
            }
            (PlayerCommand::SeekToDefaultPosition, CommandArgs::None) => {
                player.update(|b| b.position(restart(snapshot.position())))?;
            }
            (PlayerCommand::SeekInCurrentItem, CommandArgs::SeekTo { position_ms }) => {
                if snapshot.current_index().is_none() {
                    return Ok(ResultCode::InvalidState);
                }
                player.update(|b| b.position(seek_within(snapshot.position(), *position_ms)))?;
            }
            (PlayerCommand::SeekBack, CommandArgs::None) => {
                let target = snapshot
                    .position()
                    .position_ms
                    .saturating_sub(SEEK_BACK_INCREMENT_MS);
                player.update(|b| b.position(seek_within(snapshot.position(), target)))?;
            }
            (PlayerCommand::SeekForward, CommandArgs::None) => {
                let target = snapshot
                    .position()
                    .position_ms
                    .saturating_add(SEEK_FORWARD_INCREMENT_MS);
                player.update(|b| b.position(seek_within(snapshot.position(), target)))?;
            }
            (PlayerCommand::SeekToItem, CommandArgs::SeekToItem { index, position_ms }) => {
                if *index >= snapshot.timeline().len() {
                    return Ok(ResultCode::BadValue);
                }
                jump_to(player, &snapshot, *index, *position_ms)?;
            }
            (PlayerCommand::SeekToNextItem, CommandArgs::None)
            | (PlayerCommand::SeekToNext, CommandArgs::None) => match next_index(&snapshot) {
                Some(index) => jump_to(player, &snapshot, index, 0)?,
                None => return Ok(ResultCode::InvalidState),
            },
            (PlayerCommand::SeekToPreviousItem, CommandArgs::None) => {
                match previous_index(&snapshot) {
                    Some(index) => jump_to(player, &snapshot, index, 0)?,
                    None => return Ok(ResultCode::InvalidState),
                }
            }
            (PlayerCommand::SeekToPrevious, CommandArgs::None) => {
                let previous = previous_index(&snapshot);
                if snapshot.position().position_ms > MAX_SEEK_TO_PREVIOUS_POSITION_MS
                    || previous.is_none()
                {
                    player.update(|b| b.position(restart(snapshot.position())))?;
                } else if let Some(index) = previous {
                    jump_to(player, &snapshot, index, 0)?;
                }
            }
            (PlayerCommand::SetSpeedAndPitch, CommandArgs::Speed(speed)) => {
                let parameters = snapshot.parameters().with_speed(*speed);
                if !parameters.is_valid() {
                    return Ok(ResultCode::BadValue);
                }
                player.update(|b| b.parameters(parameters))?;
            }
            (PlayerCommand::SetShuffleMode, CommandArgs::Shuffle(enabled)) => {
                player.update(|b| b.shuffle_enabled(*enabled))?;
            }
            (PlayerCommand::SetRepeatMode, CommandArgs::RepeatMode(mode)) => {
                player.update(|b| b.repeat_mode(*mode))?;
            }
            (PlayerCommand::SetMediaItem, CommandArgs::MediaItem(item)) => {
                replace_items(player, vec![item.clone()], 0)?;
            }
            (PlayerCommand::ChangeMediaItems, CommandArgs::MediaItems { items, start_index }) => {
                if !items.is_empty() && *start_index >= items.len() {
                    return Ok(ResultCode::BadValue);
                }
                replace_items(player, items.clone(), *start_index)?;
            }
            (PlayerCommand::SetMetadata, CommandArgs::Metadata(metadata)) => {
                player.update(|b| b.metadata(metadata.clone()))?;
            }
            (PlayerCommand::SetVolume, CommandArgs::Volume(volume)) => {
                if !(0.0..=1.0).contains(volume) {
                    return Ok(ResultCode::BadValue);
                }
                let mut device = *snapshot.device();
                device.player_volume = *volume;
                player.update(|b| b.device(device))?;
            }
            (PlayerCommand::SetDeviceVolume, CommandArgs::DeviceVolume(volume)) => {
                let mut device = *snapshot.device();
                if !(device.info.min_volume..=device.info.max_volume).contains(volume) {
                    return Ok(ResultCode::BadValue);
                }
                device.volume = *volume;
                player.update(|b| b.device(device))?;
            }
            (PlayerCommand::AdjustDeviceVolume, CommandArgs::AdjustDeviceVolume(delta)) => {
                let mut device = *snapshot.device();
                let adjusted = i64::from(device.volume) + i64::from(*delta);
                let clamped = adjusted.clamp(
                    i64::from(device.info.min_volume),
                    i64::from(device.info.max_volume),
                );
                device.volume = u32::try_from(clamped).unwrap_or(device.info.min_volume);
                player.update(|b| b.device(device))?;
            }
            (
                PlayerCommand::GetCurrentItem
                | PlayerCommand::GetTimeline
                | PlayerCommand::GetMetadata
                | PlayerCommand::GetVolume
                | PlayerCommand::GetDeviceVolume
                | PlayerCommand::GetText,
                _,
            ) => return Ok(ResultCode::NotSupported),
            _ => return Ok(ResultCode::BadValue),
        }

        Ok(ResultCode::Success)
    }
}

impl PlayerBackend for SimplePlayer {
    fn execute(&mut self, request: &CommandRequest, player: &mut PlayerContext<'_>) -> ResultCode {
        let command = match &request.operation {
            Operation::Player(command) => *command,
            Operation::Session(_) => return ResultCode::NotSupported,
        };

        match self.apply(command, &request.args, player) {
            Ok(code) => code,
            Err(e) => {
                debug!("{} from {} rejected: {}", command, request.controller_id, e);
                ResultCode::BadValue
            }
        }
    }
}

fn restart(position: &PositionInfo) -> PositionInfo {
    PositionInfo::new(0, position.duration_ms, position.buffered_position_ms)
        .with_discontinuity(DiscontinuityReason::Seek)
}

fn seek_within(position: &PositionInfo, target_ms: u64) -> PositionInfo {
    PositionInfo::new(target_ms, position.duration_ms, position.buffered_position_ms)
        .with_discontinuity(DiscontinuityReason::Seek)
}

/// Timeline indices in playback order
///
/// Follows the timeline's shuffle order while shuffle is enabled and an
/// order is present, timeline order otherwise.
fn play_order(snapshot: &Snapshot) -> Vec<usize> {
    match snapshot.timeline().shuffle_order() {
        Some(order) if snapshot.shuffle_enabled() => order.to_vec(),
        _ => (0..snapshot.timeline().len()).collect(),
    }
}

fn next_index(snapshot: &Snapshot) -> Option<usize> {
    let current = snapshot.current_index()?;
    let order = play_order(snapshot);
    let position = order.iter().position(|&index| index == current)?;
    match order.get(position + 1) {
        Some(&index) => Some(index),
        None if snapshot.repeat_mode() == RepeatMode::All => order.first().copied(),
        None => None,
    }
}

fn previous_index(snapshot: &Snapshot) -> Option<usize> {
    let current = snapshot.current_index()?;
    let order = play_order(snapshot);
    let position = order.iter().position(|&index| index == current)?;
    if position > 0 {
        order.get(position - 1).copied()
    } else if snapshot.repeat_mode() == RepeatMode::All {
        order.last().copied()
    } else {
        None
    }
}

/// Move to `index` of the current timeline
fn jump_to(
    player: &mut PlayerContext<'_>,
    snapshot: &Snapshot,
    index: usize,
    position_ms: u64,
) -> Result<(), ModelError> {
    let metadata = snapshot
        .timeline()
        .get(index)
        .map(|item| item.metadata.clone())
        .unwrap_or_default();
    let reason = if Some(index) == snapshot.current_index() {
        DiscontinuityReason::Seek
    } else {
        DiscontinuityReason::AutoTransition
    };
    player.update(|b| {
        b.current_index(Some(index))
            .metadata(metadata)
            .position(PositionInfo::new(position_ms, None, 0).with_discontinuity(reason))
    })
}

fn replace_items(
    player: &mut PlayerContext<'_>,
    items: Vec<MediaItem>,
    start_index: usize,
) -> Result<(), ModelError> {
    let current_index = (!items.is_empty()).then_some(start_index);
    let metadata = items
        .get(start_index)
        .map(|item| item.metadata.clone())
        .unwrap_or_default();
    player.update(|b| {
        b.timeline(Timeline::new(items))
            .current_index(current_index)
            .metadata(metadata)
            .position(PositionInfo::default().with_discontinuity(DiscontinuityReason::Remove))
    })
}
