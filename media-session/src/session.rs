//! The authoritative session
//!
//! A [`Session`] is a cloneable handle to a worker thread that owns the raw
//! [`Snapshot`] and every controller connection. All mutation happens on
//! that thread, in the order tasks arrive:
//!
//! ```text
//! Session handle ──(SessionTask)──► session worker
//!                                      ├── raw Snapshot (version advances on change)
//!                                      ├── PlayerBackend / SessionCallback
//!                                      └── per connection:
//!                                            filter ─► ChangeEngine::cycle ─► Transport
//! ```
//!
//! The worker never waits on a controller. A connection whose transport
//! fails is dropped on the spot.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use session_legacy::{to_legacy, LegacyConfig, LegacyState};
use session_model::{
    filter, CapabilitySet, ChangeEngine, CommandButton, Extras, Operation, PlayerCommands,
    SessionCommands, Snapshot, SnapshotBuilder,
};

use crate::callback::{AcceptAll, ConnectDecision, ControllerInfo, SessionCallback};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::player::{PlayerBackend, PlayerContext, SimplePlayer};
use crate::protocol::{
    CapabilityUpdate, CommandRequest, CommandResult, ConnectRequest, ConnectResult, ControllerId,
    ControllerMessage, RejectReason, ResultCode, SessionMessage, StateDelta,
};
use crate::transport::{Transport, TransportError};

// ============================================================================
// Tasks
// ============================================================================

type UpdateFn = Box<dyn FnOnce(SnapshotBuilder) -> SnapshotBuilder + Send>;
type QueryFn = Box<dyn FnOnce(&SessionCore) + Send>;

/// Work items for the session worker
pub(crate) enum SessionTask {
    Update {
        apply: UpdateFn,
        reply: mpsc::Sender<Result<u64>>,
    },
    SetCapabilities {
        target: Option<ControllerId>,
        capabilities: CapabilitySet,
        reply: mpsc::Sender<Result<()>>,
    },
    Connect {
        request: ConnectRequest,
        transport: Box<dyn Transport>,
        reply: mpsc::Sender<ConnectResult>,
    },
    Disconnect {
        controller: ControllerId,
        reply: mpsc::Sender<bool>,
    },
    Message(SessionMessage),
    /// Result of a deferred command
    Complete {
        controller: ControllerId,
        seq: u64,
        result_code: ResultCode,
    },
    Query(QueryFn),
    Shutdown,
}

impl fmt::Debug for SessionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionTask::Update { .. } => f.write_str("Update"),
            SessionTask::SetCapabilities { target, .. } => f
                .debug_struct("SetCapabilities")
                .field("target", target)
                .finish(),
            SessionTask::Connect { request, .. } => {
                f.debug_tuple("Connect").field(&request.controller_id).finish()
            }
            SessionTask::Disconnect { controller, .. } => {
                f.debug_tuple("Disconnect").field(controller).finish()
            }
            SessionTask::Message(message) => f.debug_tuple("Message").field(message).finish(),
            SessionTask::Complete {
                controller,
                seq,
                result_code,
            } => f
                .debug_struct("Complete")
                .field("controller", controller)
                .field("seq", seq)
                .field("result_code", result_code)
                .finish(),
            SessionTask::Query(_) => f.write_str("Query"),
            SessionTask::Shutdown => f.write_str("Shutdown"),
        }
    }
}

// ============================================================================
// Worker state
// ============================================================================

struct Connection {
    info: ControllerInfo,
    capabilities: CapabilitySet,
    /// Filtered snapshot as last sent to the controller
    last_sent: Snapshot,
    last_legacy: Option<LegacyState>,
    transport: Box<dyn Transport>,
}

impl Connection {
    fn send(&self, message: ControllerMessage) -> std::result::Result<(), TransportError> {
        self.transport.send(&self.info.id, message)
    }

    /// Bring the controller up to date with `snapshot`
    fn sync(
        &mut self,
        snapshot: &Snapshot,
        legacy: &LegacyConfig,
    ) -> std::result::Result<(), TransportError> {
        let filtered = filter(snapshot, &self.capabilities);
        let cycle = ChangeEngine::cycle(&self.last_sent, &filtered);
        self.last_sent = filtered;

        if !cycle.is_empty() {
            debug!(
                "Sending v{} to {} ({} field(s))",
                cycle.version,
                self.info.id,
                cycle.changes.len()
            );
            self.send(ControllerMessage::State(StateDelta {
                controller_id: self.info.id.clone(),
                version: cycle.version,
                changes: cycle.changes,
            }))?;
        }
        self.sync_legacy(legacy)
    }

    /// Legacy peers get the projection whenever it differs from the last one
    fn sync_legacy(&mut self, config: &LegacyConfig) -> std::result::Result<(), TransportError> {
        if !self.info.legacy {
            return Ok(());
        }
        let projection = to_legacy(&self.last_sent, config);
        if self.last_legacy.as_ref() == Some(&projection) {
            return Ok(());
        }
        self.send(ControllerMessage::Legacy(Box::new(projection.clone())))?;
        self.last_legacy = Some(projection);
        Ok(())
    }
}

/// State owned by the session worker
pub(crate) struct SessionCore {
    snapshot: Snapshot,
    published: Arc<RwLock<Arc<Snapshot>>>,
    connections: BTreeMap<ControllerId, Connection>,
    callback: Box<dyn SessionCallback>,
    player: Box<dyn PlayerBackend>,
    legacy: LegacyConfig,
    tx: mpsc::Sender<SessionTask>,
}

impl SessionCore {
    fn run(mut self, rx: mpsc::Receiver<SessionTask>) {
        for task in rx.iter() {
            match task {
                SessionTask::Update { apply, reply } => {
                    let _ = reply.send(self.update(apply));
                }
                SessionTask::SetCapabilities {
                    target,
                    capabilities,
                    reply,
                } => {
                    let _ = reply.send(self.set_capabilities(target, capabilities));
                }
                SessionTask::Connect {
                    request,
                    transport,
                    reply,
                } => {
                    let _ = reply.send(self.connect(request, transport));
                }
                SessionTask::Disconnect { controller, reply } => {
                    let _ = reply.send(self.drop_connection(&controller, true));
                }
                SessionTask::Message(SessionMessage::Command(request)) => {
                    self.handle_command(request)
                }
                SessionTask::Message(SessionMessage::Disconnect(controller)) => {
                    self.drop_connection(&controller, true);
                }
                SessionTask::Complete {
                    controller,
                    seq,
                    result_code,
                } => self.send_result(&controller, CommandResult::executed(seq, result_code)),
                SessionTask::Query(query) => query(&self),
                SessionTask::Shutdown => {
                    self.shutdown();
                    break;
                }
            }
        }
        debug!("Session worker stopped");
    }

    fn update(&mut self, apply: UpdateFn) -> Result<u64> {
        let next = apply(self.snapshot.to_builder()).build()?;
        Ok(self.commit(next))
    }

    /// Make `next` the authoritative snapshot and fan it out
    ///
    /// Returns the resulting version, unchanged when `next` equals the
    /// current state.
    fn commit(&mut self, next: Snapshot) -> u64 {
        let current = self.snapshot.version();
        if next.with_version(current) == self.snapshot {
            return current;
        }

        let version = current + 1;
        self.snapshot = next.with_version(version);
        self.publish();
        debug!("Session state advanced to v{}", version);

        let ids: Vec<ControllerId> = self.connections.keys().cloned().collect();
        self.sync_connections(&ids);
        version
    }

    fn publish(&self) {
        *self.published.write() = Arc::new(self.snapshot.clone());
    }

    fn sync_connections(&mut self, ids: &[ControllerId]) {
        let mut failed = Vec::new();
        for id in ids {
            if let Some(connection) = self.connections.get_mut(id) {
                if let Err(e) = connection.sync(&self.snapshot, &self.legacy) {
                    warn!("Dropping controller {}: {}", id, e);
                    failed.push(id.clone());
                }
            }
        }
        for id in failed {
            self.drop_connection(&id, false);
        }
    }

    fn set_capabilities(
        &mut self,
        target: Option<ControllerId>,
        capabilities: CapabilitySet,
    ) -> Result<()> {
        let ids: Vec<ControllerId> = match target {
            Some(id) if !self.connections.contains_key(&id) => {
                return Err(SessionError::ControllerNotFound(id))
            }
            Some(id) => vec![id],
            None => self.connections.keys().cloned().collect(),
        };
        if ids.is_empty() {
            return Ok(());
        }

        // Capability changes are state changes for the controllers they hit
        let version = self.snapshot.version() + 1;
        self.snapshot = self.snapshot.with_version(version);
        self.publish();

        let mut failed = Vec::new();
        for id in &ids {
            let Some(connection) = self.connections.get_mut(id) else {
                continue;
            };
            connection.capabilities = capabilities.clone();
            info!("Capabilities of {} updated at v{}", id, version);

            let update = ControllerMessage::Capabilities(CapabilityUpdate {
                controller_id: id.clone(),
                capabilities: capabilities.clone(),
            });
            let sent = connection
                .send(update)
                .and_then(|()| connection.sync(&self.snapshot, &self.legacy));
            if let Err(e) = sent {
                warn!("Dropping controller {}: {}", id, e);
                failed.push(id.clone());
            }
        }
        for id in failed {
            self.drop_connection(&id, false);
        }
        Ok(())
    }

    fn connect(&mut self, request: ConnectRequest, transport: Box<dyn Transport>) -> ConnectResult {
        let id = request.controller_id;
        if self.connections.contains_key(&id) {
            warn!("Rejecting duplicate controller {}", id);
            return ConnectResult::rejected(RejectReason::DuplicateController);
        }

        let info = ControllerInfo {
            id: id.clone(),
            legacy: request.legacy,
        };
        let capabilities = match self.callback.on_connect(&info) {
            ConnectDecision::Accept(capabilities) => capabilities,
            ConnectDecision::Reject(reason) => {
                info!("Controller {} rejected: {:?}", id, reason);
                return ConnectResult::rejected(reason);
            }
        };

        let filtered = filter(&self.snapshot, &capabilities);
        let mut connection = Connection {
            info,
            capabilities: capabilities.clone(),
            last_sent: filtered.clone(),
            last_legacy: None,
            transport,
        };
        if let Err(e) = connection.sync_legacy(&self.legacy) {
            warn!("Controller {} unreachable during connect: {}", id, e);
            return ConnectResult::rejected(RejectReason::Other(e.to_string()));
        }

        info!(
            "Controller {} connected at v{} ({} player command(s))",
            id,
            filtered.version(),
            filtered.available_commands().player.len()
        );
        self.connections.insert(id, connection);
        ConnectResult::accepted(capabilities, filtered)
    }

    /// Remove a connection; returns whether it existed
    fn drop_connection(&mut self, id: &ControllerId, notify: bool) -> bool {
        let Some(connection) = self.connections.remove(id) else {
            return false;
        };
        if notify {
            let _ = connection.send(ControllerMessage::Disconnected);
        }
        self.callback.on_disconnected(&connection.info);
        info!("Controller {} disconnected", id);
        true
    }

    /// Operations a controller may have executed right now
    fn effective_capabilities(&self, connection: &Connection) -> CapabilitySet {
        CapabilitySet::new(
            self.snapshot
                .available_commands()
                .player
                .intersect(connection.capabilities.player),
            connection.capabilities.session.clone(),
        )
    }

    fn handle_command(&mut self, request: CommandRequest) {
        let Some(connection) = self.connections.get(&request.controller_id) else {
            debug!(
                "Ignoring command {} from unknown controller {}",
                request.seq, request.controller_id
            );
            return;
        };

        if !self
            .effective_capabilities(connection)
            .is_allowed(&request.operation)
        {
            warn!(
                "Rejected {} from {}: not in its capability set",
                request.operation, request.controller_id
            );
            let id = connection.info.id.clone();
            self.send_result(&id, CommandResult::rejected(request.seq));
            return;
        }

        let current = self.snapshot.version();
        if request.known_version < current {
            debug!(
                "Command {} from {} saw v{}, executing against v{}",
                request.operation, request.controller_id, request.known_version, current
            );
        }

        let info = connection.info.clone();
        let mut working = self.snapshot.clone();
        let (result_code, changed, deferred) = {
            let mut context =
                PlayerContext::new(&mut working, self.tx.clone(), info.id.clone(), request.seq);
            let result_code = match &request.operation {
                Operation::Player(_) => self.player.execute(&request, &mut context),
                Operation::Session(command) => {
                    self.callback
                        .on_custom_command(&info, command, &request.args, &mut context)
                }
            };
            (result_code, context.changed(), context.is_deferred())
        };
        debug!(
            "Executed {} for {}: {:?}",
            request.operation, info.id, result_code
        );

        if changed {
            self.commit(working);
        }
        if !deferred {
            self.send_result(&info.id, CommandResult::executed(request.seq, result_code));
        }
    }

    fn send_result(&mut self, id: &ControllerId, result: CommandResult) {
        let Some(connection) = self.connections.get(id) else {
            debug!("Dropping result {} for disconnected {}", result.seq, id);
            return;
        };
        if let Err(e) = connection.send(ControllerMessage::CommandResult(result)) {
            warn!("Dropping controller {}: {}", id, e);
            self.drop_connection(id, false);
        }
    }

    fn shutdown(&mut self) {
        let ids: Vec<ControllerId> = self.connections.keys().cloned().collect();
        for id in ids {
            self.drop_connection(&id, true);
        }
        info!("Session released at v{}", self.snapshot.version());
    }

    pub(crate) fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub(crate) fn controller_infos(&self) -> Vec<ControllerInfo> {
        self.connections
            .values()
            .map(|connection| connection.info.clone())
            .collect()
    }

    pub(crate) fn capabilities_of(&self, id: &ControllerId) -> Option<CapabilitySet> {
        self.connections
            .get(id)
            .map(|connection| connection.capabilities.clone())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Configures and starts a [`Session`]
pub struct SessionBuilder {
    config: SessionConfig,
    initial: Snapshot,
    callback: Box<dyn SessionCallback>,
    player: Box<dyn PlayerBackend>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            config: SessionConfig::default(),
            initial: Snapshot::default(),
            callback: Box::new(AcceptAll),
            player: Box::new(SimplePlayer::new()),
        }
    }
}

impl SessionBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn hide_play_suppression(mut self, hide: bool) -> Self {
        self.config.hide_play_suppression = hide;
        self
    }

    pub fn legacy_queue_size_limit_bytes(mut self, limit: usize) -> Self {
        self.config.legacy_queue_size_limit_bytes = limit;
        self
    }

    pub fn max_listener_failures(mut self, max: u32) -> Self {
        self.config.max_listener_failures = max;
        self
    }

    pub fn worker_thread_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.worker_thread_prefix = prefix.into();
        self
    }

    /// Starting state; its version becomes the session's first version
    pub fn initial_snapshot(mut self, snapshot: Snapshot) -> Self {
        self.initial = snapshot;
        self
    }

    pub fn callback(mut self, callback: impl SessionCallback + 'static) -> Self {
        self.callback = Box::new(callback);
        self
    }

    pub fn player(mut self, player: impl PlayerBackend + 'static) -> Self {
        self.player = Box::new(player);
        self
    }

    /// Spawn the session worker
    pub fn build(self) -> Result<Session> {
        let (tx, rx) = mpsc::channel();
        let published = Arc::new(RwLock::new(Arc::new(self.initial.clone())));
        let config = Arc::new(self.config);

        let core = SessionCore {
            snapshot: self.initial,
            published: Arc::clone(&published),
            connections: BTreeMap::new(),
            callback: self.callback,
            player: self.player,
            legacy: config.legacy(),
            tx: tx.clone(),
        };

        let worker = thread::Builder::new()
            .name(config.thread_name("session"))
            .spawn(move || core.run(rx))?;
        let worker_thread = worker.thread().id();
        info!("Session started");

        Ok(Session {
            inner: Arc::new(SessionShared {
                tx,
                released: AtomicBool::new(false),
                snapshot: published,
                config,
                worker: Mutex::new(Some(worker)),
                worker_thread,
            }),
        })
    }
}

// ============================================================================
// Handle
// ============================================================================

struct SessionShared {
    tx: mpsc::Sender<SessionTask>,
    released: AtomicBool,
    snapshot: Arc<RwLock<Arc<Snapshot>>>,
    config: Arc<SessionConfig>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_thread: ThreadId,
}

impl Drop for SessionShared {
    fn drop(&mut self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(SessionTask::Shutdown);
        }
    }
}

/// Handle to a running session
///
/// Cloning is cheap; all clones talk to the same worker. Blocking calls
/// wait for the worker to process everything queued before them.
///
/// # Example
///
/// ```rust
/// use media_session::Session;
/// use session_model::{MediaItem, Timeline};
///
/// let session = Session::builder().build()?;
/// let version = session.update(|state| {
///     state
///         .timeline(Timeline::single(MediaItem::titled("intro", "Intro")))
///         .current_index(Some(0))
/// })?;
/// assert_eq!(session.snapshot().version(), version);
/// session.release();
/// # Ok::<(), media_session::SessionError>(())
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionShared>,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Latest authoritative snapshot, unfiltered
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.snapshot.read().clone()
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }

    fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.inner.worker_thread
    }

    fn send(&self, task: SessionTask) -> Result<()> {
        if self.is_released() {
            return Err(SessionError::Released);
        }
        self.inner
            .tx
            .send(task)
            .map_err(|_| SessionError::WorkerDisconnected)
    }

    /// Send a task and wait for the worker's reply
    fn request<T>(&self, make: impl FnOnce(mpsc::Sender<T>) -> SessionTask) -> Result<T> {
        if self.is_worker_thread() {
            return Err(SessionError::ReentrantCall);
        }
        let (reply, rx) = mpsc::channel();
        self.send(make(reply))?;
        rx.recv().map_err(|_| {
            if self.is_released() {
                SessionError::Released
            } else {
                SessionError::WorkerDisconnected
            }
        })
    }

    fn query<R, F>(&self, query: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&SessionCore) -> R + Send + 'static,
    {
        self.request(move |reply| {
            SessionTask::Query(Box::new(move |core: &SessionCore| {
                let _ = reply.send(query(core));
            }))
        })
    }

    /// Change the state through a builder and fan the result out
    ///
    /// Returns the new version, or the current one when nothing changed.
    pub fn update<F>(&self, apply: F) -> Result<u64>
    where
        F: FnOnce(SnapshotBuilder) -> SnapshotBuilder + Send + 'static,
    {
        self.request(|reply| SessionTask::Update {
            apply: Box::new(apply),
            reply,
        })?
    }

    /// Record the commands the player currently supports
    pub fn set_available_commands(&self, commands: PlayerCommands) -> Result<u64> {
        self.update(move |state| {
            state.available_commands(CapabilitySet::new(commands, SessionCommands::empty()))
        })
    }

    pub fn set_custom_layout(&self, layout: Vec<CommandButton>) -> Result<u64> {
        self.update(move |state| state.custom_layout(layout))
    }

    pub fn set_extras(&self, extras: Extras) -> Result<u64> {
        self.update(move |state| state.extras(extras))
    }

    /// Replace one controller's capabilities
    ///
    /// The controller receives a [`CapabilityUpdate`] followed by one cycle
    /// holding the available-commands change and every field it forces.
    pub fn set_capabilities(&self, controller: &ControllerId, capabilities: CapabilitySet) -> Result<()> {
        let target = Some(controller.clone());
        self.request(|reply| SessionTask::SetCapabilities {
            target,
            capabilities,
            reply,
        })?
    }

    pub fn set_capabilities_for_all(&self, capabilities: CapabilitySet) -> Result<()> {
        self.request(|reply| SessionTask::SetCapabilities {
            target: None,
            capabilities,
            reply,
        })?
    }

    /// Run the handshake for a controller reachable through `transport`
    ///
    /// A refusal is reported in the returned [`ConnectResult`], not as an
    /// error.
    pub fn connect<T>(&self, request: ConnectRequest, transport: T) -> Result<ConnectResult>
    where
        T: Transport + 'static,
    {
        self.request(|reply| SessionTask::Connect {
            request,
            transport: Box::new(transport),
            reply,
        })
    }

    pub fn disconnect(&self, controller: &ControllerId) -> Result<()> {
        let id = controller.clone();
        let existed = self.request(|reply| SessionTask::Disconnect {
            controller: id,
            reply,
        })?;
        if existed {
            Ok(())
        } else {
            Err(SessionError::ControllerNotFound(controller.clone()))
        }
    }

    pub fn controllers(&self) -> Result<Vec<ControllerInfo>> {
        self.query(SessionCore::controller_infos)
    }

    /// Capabilities granted to `controller`
    pub fn capabilities(&self, controller: &ControllerId) -> Result<CapabilitySet> {
        let id = controller.clone();
        self.query(move |core| core.capabilities_of(&id))?
            .ok_or_else(|| SessionError::ControllerNotFound(controller.clone()))
    }

    /// Version as seen by the worker, after every queued task
    pub fn settled_version(&self) -> Result<u64> {
        self.query(|core| core.snapshot().version())
    }

    /// Legacy projection of the current state
    ///
    /// Computed with the default controller capabilities plus every session
    /// command bound by the custom layout.
    pub fn legacy_state(&self) -> LegacyState {
        let snapshot = self.snapshot();
        let capabilities = legacy_capabilities(&snapshot);
        to_legacy(&filter(&snapshot, &capabilities), &self.inner.config.legacy())
    }

    /// Deliver a controller message without waiting
    pub fn post(&self, message: SessionMessage) -> Result<()> {
        self.send(SessionTask::Message(message))
    }

    /// Stop the session
    ///
    /// Every controller is sent `Disconnected` and dropped. Later calls on
    /// any clone fail with [`SessionError::Released`].
    pub fn release(&self) {
        if self.inner.released.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.inner.tx.send(SessionTask::Shutdown);
        if self.is_worker_thread() {
            return;
        }
        if let Some(worker) = self.inner.worker.lock().take() {
            if worker.join().is_err() {
                warn!("Session worker panicked during shutdown");
            }
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("version", &self.snapshot().version())
            .field("released", &self.is_released())
            .finish()
    }
}

fn legacy_capabilities(snapshot: &Snapshot) -> CapabilitySet {
    let layout_commands: SessionCommands = snapshot
        .custom_layout()
        .iter()
        .filter_map(|button| match &button.operation {
            Operation::Session(command) => Some(command.clone()),
            Operation::Player(_) => None,
        })
        .collect();
    let defaults = CapabilitySet::default_for_controller();
    CapabilitySet::new(defaults.player, defaults.session.union(&layout_commands))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use session_model::{FieldChange, MediaItem, PlayerCommand, Timeline};

    fn two_items(state: SnapshotBuilder) -> SnapshotBuilder {
        state
            .timeline(Timeline::new(vec![
                MediaItem::titled("a", "A"),
                MediaItem::titled("b", "B"),
            ]))
            .current_index(Some(0))
    }

    #[test]
    fn test_update_bumps_version_only_on_change() {
        let session = Session::builder().build().unwrap();
        assert_eq!(session.update(two_items).unwrap(), 1);
        assert_eq!(session.update(two_items).unwrap(), 1);
        assert_eq!(session.update(|s| s.shuffle_enabled(true)).unwrap(), 2);
        assert_eq!(session.snapshot().version(), 2);
        session.release();
    }

    #[test]
    fn test_invalid_update_rejected() {
        let session = Session::builder().build().unwrap();
        let result = session.update(|s| s.current_index(Some(4)));
        assert!(matches!(result, Err(SessionError::Model(_))));
        assert_eq!(session.snapshot().version(), 0);
        session.release();
    }

    #[test]
    fn test_connect_sends_filtered_deltas() {
        let session = Session::builder().build().unwrap();
        session.update(two_items).unwrap();

        let (transport, rx) = ChannelTransport::pair();
        let result = session
            .connect(ConnectRequest::new("c"), transport)
            .unwrap();
        assert!(result.accepted);
        assert_eq!(result.snapshot.unwrap().timeline().len(), 2);

        session.update(|s| s.play_when_ready(true)).unwrap();
        match rx.recv().unwrap() {
            ControllerMessage::State(delta) => {
                assert_eq!(delta.version, 2);
                assert_eq!(delta.changes, vec![FieldChange::PlayWhenReady(true)]);
            }
            other => panic!("unexpected message: {:?}", other),
        }
        session.release();
    }

    #[test]
    fn test_duplicate_controller_rejected() {
        let session = Session::builder().build().unwrap();
        let (first, _rx1) = ChannelTransport::pair();
        let (second, _rx2) = ChannelTransport::pair();

        assert!(session.connect(ConnectRequest::new("c"), first).unwrap().accepted);
        let duplicate = session.connect(ConnectRequest::new("c"), second).unwrap();
        assert_eq!(duplicate.reject_reason, Some(RejectReason::DuplicateController));
        session.release();
    }

    #[test]
    fn test_set_capabilities_unknown_controller() {
        let session = Session::builder().build().unwrap();
        let result = session.set_capabilities(&"nobody".into(), CapabilitySet::empty());
        assert!(matches!(result, Err(SessionError::ControllerNotFound(_))));
        session.release();
    }

    #[test]
    fn test_calls_after_release_fail() {
        let session = Session::builder().build().unwrap();
        let clone = session.clone();
        session.release();

        assert!(clone.is_released());
        assert!(matches!(clone.update(|s| s), Err(SessionError::Released)));
        assert!(matches!(clone.controllers(), Err(SessionError::Released)));
    }

    #[test]
    fn test_legacy_capabilities_include_layout_commands() {
        let snapshot = Snapshot::builder()
            .custom_layout(vec![
                CommandButton::new("Like", session_model::SessionCommand::custom("like")),
                CommandButton::new("Stop", PlayerCommand::Stop),
            ])
            .build()
            .unwrap();
        let capabilities = legacy_capabilities(&snapshot);
        assert!(capabilities.session.contains_action("like"));
        assert!(capabilities.allows_player(PlayerCommand::Stop));
    }
}
