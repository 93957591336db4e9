//! Controller handle
//!
//! A [`Controller`] is the remote end of one session connection. It owns:
//!
//! - a dispatch worker that applies incoming state deltas to its
//!   last-delivered snapshot and calls listeners, one cycle at a time
//! - a link thread that reads [`ControllerMessage`]s from the transport
//!   and routes them (deltas to the dispatch worker, command results to
//!   the waiting [`PendingResult`])
//!
//! Commands go straight to the session and never wait on the dispatch
//! worker, so a listener may issue commands from inside a callback. Their
//! effects arrive as later cycles.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use session_dispatch::{
    spawn_dispatch_worker, CycleIterator, DispatchConfig, DispatchHandle, Listener, ListenerId,
};
use session_legacy::{to_legacy, LegacyConfig, LegacyState};
use session_model::{
    CapabilitySet, Extras, MediaItem, MediaMetadata, Operation, PlayerCommand, RepeatMode,
    SessionCommand, Snapshot,
};

use crate::error::{Result, SessionError};
use crate::protocol::{
    CommandArgs, CommandRequest, CommandResult, ConnectRequest, ControllerId, ControllerMessage,
    RejectReason, SessionMessage,
};
use crate::session::Session;
use crate::transport::ChannelTransport;

type PendingMap = Arc<Mutex<HashMap<u64, mpsc::Sender<CommandResult>>>>;

// ============================================================================
// PendingResult
// ============================================================================

/// Result of a command that may not have completed yet
#[derive(Debug)]
pub struct PendingResult {
    seq: u64,
    rx: mpsc::Receiver<CommandResult>,
}

impl PendingResult {
    fn ready(result: CommandResult) -> Self {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(result);
        Self {
            seq: result.seq,
            rx,
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Block until the session answers
    ///
    /// Reports [`crate::ResultCode::Disconnected`] if the connection ends
    /// first.
    pub fn wait(self) -> CommandResult {
        self.rx
            .recv()
            .unwrap_or_else(|_| CommandResult::disconnected(self.seq))
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<CommandResult> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => Some(CommandResult::disconnected(self.seq)),
        }
    }

    pub fn try_result(&self) -> Option<CommandResult> {
        self.rx.try_recv().ok()
    }
}

// ============================================================================
// Link thread
// ============================================================================

struct Link {
    id: ControllerId,
    dispatch: DispatchHandle,
    capabilities: Arc<RwLock<CapabilitySet>>,
    pending: PendingMap,
    connected: Arc<AtomicBool>,
}

impl Link {
    fn run(self, rx: mpsc::Receiver<ControllerMessage>) {
        for message in rx.iter() {
            match message {
                ControllerMessage::State(delta) => {
                    let version = delta.version;
                    if let Err(e) = self.dispatch.enqueue_cycle(delta.into_cycle()) {
                        debug!("{} dropped v{}: {}", self.id, version, e);
                    }
                }
                ControllerMessage::Capabilities(update) => {
                    debug!("{} capabilities updated", self.id);
                    *self.capabilities.write() = update.capabilities;
                }
                ControllerMessage::CommandResult(result) => {
                    match self.pending.lock().remove(&result.seq) {
                        Some(tx) => {
                            let _ = tx.send(result);
                        }
                        None => debug!("{} got result for unknown command {}", self.id, result.seq),
                    }
                }
                ControllerMessage::Legacy(_) => {
                    debug!("{} ignoring legacy projection", self.id);
                }
                ControllerMessage::Disconnected => break,
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        fail_pending(&self.pending);
        info!("Controller {} lost its session", self.id);
    }
}

fn fail_pending(pending: &PendingMap) {
    for (seq, tx) in pending.lock().drain() {
        let _ = tx.send(CommandResult::disconnected(seq));
    }
}

// ============================================================================
// Controller
// ============================================================================

struct ControllerShared {
    id: ControllerId,
    session: Session,
    dispatch: DispatchHandle,
    capabilities: Arc<RwLock<CapabilitySet>>,
    pending: PendingMap,
    next_seq: AtomicU64,
    connected: Arc<AtomicBool>,
    released: AtomicBool,
    legacy: LegacyConfig,
}

impl ControllerShared {
    fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self
                .session
                .post(SessionMessage::Disconnect(self.id.clone()));
        }
        self.dispatch.release();
        fail_pending(&self.pending);
        info!("Controller {} released", self.id);
    }
}

impl Drop for ControllerShared {
    fn drop(&mut self) {
        self.release();
    }
}

/// Handle to one connection with a [`Session`]
///
/// Cloning is cheap; clones share the connection, so a listener can hold
/// one to send commands. Call [`Controller::release`] when done; a
/// listener holding a clone keeps the connection alive otherwise.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use media_session::{Controller, Session};
///
/// let session = Session::builder().build()?;
/// let controller = Controller::connect(&session, "remote")?;
/// let cycles = controller.iter()?;
///
/// let result = controller.set_shuffle_mode_enabled(true)?.wait();
/// assert!(result.is_success());
///
/// let cycle = cycles.recv_timeout(Duration::from_secs(1)).unwrap();
/// assert!(cycle.snapshot.shuffle_enabled());
///
/// controller.release();
/// session.release();
/// # Ok::<(), media_session::SessionError>(())
/// ```
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerShared>,
}

impl Controller {
    /// Connect a modern controller
    pub fn connect(session: &Session, id: impl Into<ControllerId>) -> Result<Self> {
        Self::connect_with(session, ConnectRequest::new(id))
    }

    /// Connect with an explicit request
    pub fn connect_with(session: &Session, request: ConnectRequest) -> Result<Self> {
        let id = request.controller_id.clone();
        let (transport, rx) = ChannelTransport::pair();

        let result = session.connect(request, transport)?;
        if !result.accepted {
            return Err(SessionError::Rejected(
                result.reject_reason.unwrap_or(RejectReason::NotAllowed),
            ));
        }
        let (Some(capabilities), Some(snapshot)) = (result.capabilities, result.snapshot) else {
            let _ = session.disconnect(&id);
            return Err(SessionError::Rejected(RejectReason::Other(
                "incomplete connect result".to_string(),
            )));
        };

        let config = session.config();
        let dispatch_config = DispatchConfig {
            max_listener_failures: config.max_listener_failures,
            thread_name: config.thread_name(&format!("dispatch-{}", id)),
        };
        let dispatch = match spawn_dispatch_worker(dispatch_config, snapshot) {
            Ok(dispatch) => dispatch,
            Err(e) => {
                let _ = session.disconnect(&id);
                return Err(e.into());
            }
        };

        let capabilities = Arc::new(RwLock::new(capabilities));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));

        let link = Link {
            id: id.clone(),
            dispatch: dispatch.clone(),
            capabilities: Arc::clone(&capabilities),
            pending: Arc::clone(&pending),
            connected: Arc::clone(&connected),
        };
        let spawned = thread::Builder::new()
            .name(config.thread_name(&format!("link-{}", id)))
            .spawn(move || link.run(rx));
        if let Err(e) = spawned {
            dispatch.release();
            let _ = session.disconnect(&id);
            return Err(e.into());
        }

        info!("Controller {} connected", id);
        Ok(Self {
            inner: Arc::new(ControllerShared {
                id,
                session: session.clone(),
                dispatch,
                capabilities,
                pending,
                next_seq: AtomicU64::new(1),
                connected,
                released: AtomicBool::new(false),
                legacy: config.legacy(),
            }),
        })
    }

    pub fn id(&self) -> &ControllerId {
        &self.inner.id
    }

    /// Whether the session still holds this connection
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }

    /// Last-delivered (filtered) snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.dispatch.snapshot()
    }

    /// Capabilities granted by the session
    pub fn capabilities(&self) -> CapabilitySet {
        self.inner.capabilities.read().clone()
    }

    pub fn add_listener(&self, listener: impl Listener + 'static) -> Result<ListenerId> {
        Ok(self.inner.dispatch.add_listener(Box::new(listener))?)
    }

    pub fn remove_listener(&self, id: ListenerId) -> Result<()> {
        Ok(self.inner.dispatch.remove_listener(id)?)
    }

    /// Blocking iterator over cycles delivered from now on
    pub fn iter(&self) -> Result<CycleIterator> {
        Ok(self.inner.dispatch.subscribe()?)
    }

    /// Legacy projection of the last-delivered snapshot
    pub fn legacy_state(&self) -> LegacyState {
        to_legacy(&self.snapshot(), &self.inner.legacy)
    }

    /// Send a command to the session
    ///
    /// The session checks the operation against this controller's current
    /// capabilities; a disallowed one comes back as a rejected result.
    pub fn send(&self, operation: impl Into<Operation>, args: CommandArgs) -> Result<PendingResult> {
        if self.is_released() {
            return Err(SessionError::Released);
        }
        let operation = operation.into();
        let seq = self.inner.next_seq.fetch_add(1, Ordering::SeqCst);

        if !self.is_connected() {
            return Ok(PendingResult::ready(CommandResult::disconnected(seq)));
        }
        if !self.snapshot().available_commands().is_allowed(&operation) {
            debug!("{} sending {} without holding it", self.inner.id, operation);
        }

        let (tx, rx) = mpsc::channel();
        self.inner.pending.lock().insert(seq, tx);
        if !self.is_connected() {
            fail_pending(&self.inner.pending);
        }

        let request = CommandRequest {
            controller_id: self.inner.id.clone(),
            seq,
            known_version: self.snapshot().version(),
            operation,
            args,
        };
        debug!("{} sending {} (seq {})", self.inner.id, request.operation, seq);

        if let Err(e) = self.inner.session.post(SessionMessage::Command(request)) {
            debug!("{} could not reach session: {}", self.inner.id, e);
            if let Some(tx) = self.inner.pending.lock().remove(&seq) {
                let _ = tx.send(CommandResult::disconnected(seq));
            }
        }
        Ok(PendingResult { seq, rx })
    }

    fn player(&self, command: PlayerCommand, args: CommandArgs) -> Result<PendingResult> {
        self.send(command, args)
    }

    // ========================================================================
    // Typed commands
    // ========================================================================

    pub fn play(&self) -> Result<PendingResult> {
        self.player(PlayerCommand::PlayPause, CommandArgs::PlayWhenReady(true))
    }

    pub fn pause(&self) -> Result<PendingResult> {
        self.player(PlayerCommand::PlayPause, CommandArgs::PlayWhenReady(false))
    }

    pub fn prepare(&self) -> Result<PendingResult> {
        self.player(PlayerCommand::Prepare, CommandArgs::None)
    }

    pub fn stop(&self) -> Result<PendingResult> {
        self.player(PlayerCommand::Stop, CommandArgs::None)
    }

    /// Seek within the current item
    pub fn seek_to(&self, position_ms: u64) -> Result<PendingResult> {
        self.player(
            PlayerCommand::SeekInCurrentItem,
            CommandArgs::SeekTo { position_ms },
        )
    }

    pub fn seek_to_default_position(&self) -> Result<PendingResult> {
        self.player(PlayerCommand::SeekToDefaultPosition, CommandArgs::None)
    }

    pub fn seek_to_item(&self, index: usize, position_ms: u64) -> Result<PendingResult> {
        self.player(
            PlayerCommand::SeekToItem,
            CommandArgs::SeekToItem { index, position_ms },
        )
    }

    pub fn seek_to_next(&self) -> Result<PendingResult> {
        self.player(PlayerCommand::SeekToNext, CommandArgs::None)
    }

    pub fn seek_to_previous(&self) -> Result<PendingResult> {
        self.player(PlayerCommand::SeekToPrevious, CommandArgs::None)
    }

    pub fn seek_back(&self) -> Result<PendingResult> {
        self.player(PlayerCommand::SeekBack, CommandArgs::None)
    }

    pub fn seek_forward(&self) -> Result<PendingResult> {
        self.player(PlayerCommand::SeekForward, CommandArgs::None)
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) -> Result<PendingResult> {
        self.player(PlayerCommand::SetRepeatMode, CommandArgs::RepeatMode(mode))
    }

    pub fn set_shuffle_mode_enabled(&self, enabled: bool) -> Result<PendingResult> {
        self.player(PlayerCommand::SetShuffleMode, CommandArgs::Shuffle(enabled))
    }

    pub fn set_playback_speed(&self, speed: f32) -> Result<PendingResult> {
        self.player(PlayerCommand::SetSpeedAndPitch, CommandArgs::Speed(speed))
    }

    pub fn set_volume(&self, volume: f32) -> Result<PendingResult> {
        self.player(PlayerCommand::SetVolume, CommandArgs::Volume(volume))
    }

    pub fn set_device_volume(&self, volume: u32) -> Result<PendingResult> {
        self.player(PlayerCommand::SetDeviceVolume, CommandArgs::DeviceVolume(volume))
    }

    pub fn adjust_device_volume(&self, delta: i32) -> Result<PendingResult> {
        self.player(
            PlayerCommand::AdjustDeviceVolume,
            CommandArgs::AdjustDeviceVolume(delta),
        )
    }

    pub fn set_media_item(&self, item: MediaItem) -> Result<PendingResult> {
        self.player(PlayerCommand::SetMediaItem, CommandArgs::MediaItem(item))
    }

    pub fn set_media_items(&self, items: Vec<MediaItem>, start_index: usize) -> Result<PendingResult> {
        self.player(
            PlayerCommand::ChangeMediaItems,
            CommandArgs::MediaItems { items, start_index },
        )
    }

    pub fn set_metadata(&self, metadata: MediaMetadata) -> Result<PendingResult> {
        self.player(PlayerCommand::SetMetadata, CommandArgs::Metadata(metadata))
    }

    pub fn send_custom_command(&self, action: &str, args: Extras) -> Result<PendingResult> {
        self.send(SessionCommand::custom(action), CommandArgs::Custom(args))
    }

    /// Disconnect and stop delivery
    ///
    /// Listeners see nothing after this returns, except for a cycle already
    /// in progress when called from outside a callback. Pending commands
    /// report `Disconnected`.
    pub fn release(&self) {
        self.inner.release();
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("id", &self.inner.id)
            .field("connected", &self.is_connected())
            .field("released", &self.is_released())
            .finish()
    }
}
