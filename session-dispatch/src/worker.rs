//! Per-controller dispatch worker thread
//!
//! Each controller gets one thread that drains an ordered task queue and
//! owns the controller's [`Dispatcher`]. Everything that touches listeners
//! or the last-delivered snapshot happens on that thread, so cycles are
//! never interleaved.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use session_model::{Cycle, Snapshot};

use crate::dispatcher::{DispatchPhase, Dispatcher};
use crate::error::{DispatchError, Result};
use crate::iter::CycleIterator;
use crate::listener::{Listener, ListenerId};

/// Work items for the dispatch worker, processed strictly in order
pub enum DispatchTask {
    /// Deliver a cycle
    Cycle(Cycle),
    /// Register a listener under a pre-allocated id
    AddListener(ListenerId, Box<dyn Listener>),
    /// Unregister a listener
    RemoveListener(ListenerId),
    /// Start feeding delivered cycles into a channel
    Subscribe(mpsc::Sender<crate::iter::DeliveredCycle>),
    /// Run a closure on the worker against the last-delivered snapshot
    Call(Box<dyn FnOnce(&Snapshot) + Send>),
    /// Stop the worker
    Shutdown,
}

impl fmt::Debug for DispatchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchTask::Cycle(cycle) => f.debug_tuple("Cycle").field(&cycle.version).finish(),
            DispatchTask::AddListener(id, _) => f.debug_tuple("AddListener").field(id).finish(),
            DispatchTask::RemoveListener(id) => f.debug_tuple("RemoveListener").field(id).finish(),
            DispatchTask::Subscribe(_) => f.write_str("Subscribe"),
            DispatchTask::Call(_) => f.write_str("Call"),
            DispatchTask::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Settings for one dispatch worker
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Consecutive failed cycles before a listener is unregistered
    pub max_listener_failures: u32,
    /// Name given to the worker thread
    pub thread_name: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_listener_failures: 3,
            thread_name: "session-dispatch".to_string(),
        }
    }
}

/// Cloneable handle to a running dispatch worker
///
/// All methods are non-blocking except [`DispatchHandle::release`], which
/// waits for an in-flight cycle to finish.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::Sender<DispatchTask>,
    released: Arc<AtomicBool>,
    next_listener_id: Arc<AtomicU64>,
    snapshot: Arc<RwLock<Arc<Snapshot>>>,
    phase: Arc<Mutex<DispatchPhase>>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
    worker_thread: ThreadId,
}

/// Start a dispatch worker whose last-delivered snapshot starts at `initial`
pub fn spawn_dispatch_worker(config: DispatchConfig, initial: Snapshot) -> Result<DispatchHandle> {
    let (tx, rx) = mpsc::channel();
    let released = Arc::new(AtomicBool::new(false));

    let dispatcher = Dispatcher::new(initial, config.max_listener_failures);
    let snapshot = dispatcher.snapshot_cell();
    let phase = dispatcher.phase_cell();

    let worker_released = Arc::clone(&released);
    let worker = thread::Builder::new()
        .name(config.thread_name.clone())
        .spawn(move || run_dispatch_loop(dispatcher, rx, worker_released))?;
    let worker_thread = worker.thread().id();

    debug!("Dispatch worker '{}' started", config.thread_name);

    Ok(DispatchHandle {
        tx,
        released,
        next_listener_id: Arc::new(AtomicU64::new(1)),
        snapshot,
        phase,
        worker: Arc::new(Mutex::new(Some(worker))),
        worker_thread,
    })
}

fn run_dispatch_loop(
    mut dispatcher: Dispatcher,
    rx: mpsc::Receiver<DispatchTask>,
    released: Arc<AtomicBool>,
) {
    for task in rx.iter() {
        match task {
            DispatchTask::Cycle(cycle) => {
                if released.load(Ordering::SeqCst) {
                    debug!("Discarding cycle v{} after release", cycle.version);
                    continue;
                }
                dispatcher.deliver(cycle);
            }
            DispatchTask::AddListener(id, listener) => {
                dispatcher.add_listener(id, listener);
                debug!("Registered {} ({} total)", id, dispatcher.listener_count());
            }
            DispatchTask::RemoveListener(id) => {
                if !dispatcher.remove_listener(id) {
                    debug!("{} was not registered", id);
                }
            }
            DispatchTask::Subscribe(tx) => dispatcher.subscribe(tx),
            DispatchTask::Call(call) => {
                if !released.load(Ordering::SeqCst) {
                    call(&dispatcher.snapshot());
                }
            }
            DispatchTask::Shutdown => {
                debug!("Dispatch worker received shutdown");
                break;
            }
        }
    }
    debug!("Dispatch worker stopped");
}

impl DispatchHandle {
    fn send(&self, task: DispatchTask) -> Result<()> {
        if self.is_released() {
            return Err(DispatchError::Released);
        }
        self.tx
            .send(task)
            .map_err(|_| DispatchError::WorkerDisconnected)
    }

    /// Queue a cycle behind everything already queued
    pub fn enqueue_cycle(&self, cycle: Cycle) -> Result<()> {
        self.send(DispatchTask::Cycle(cycle))
    }

    /// Register a listener; it receives cycles queued after this call
    pub fn add_listener(&self, listener: Box<dyn Listener>) -> Result<ListenerId> {
        let id = ListenerId::new(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        self.send(DispatchTask::AddListener(id, listener))?;
        Ok(id)
    }

    pub fn remove_listener(&self, id: ListenerId) -> Result<()> {
        self.send(DispatchTask::RemoveListener(id))
    }

    /// Blocking iterator over cycles delivered from now on
    pub fn subscribe(&self) -> Result<CycleIterator> {
        let (tx, rx) = mpsc::channel();
        self.send(DispatchTask::Subscribe(tx))?;
        Ok(CycleIterator::new(rx))
    }

    /// Run `call` on the worker, after every task queued before it
    pub fn call<F>(&self, call: F) -> Result<()>
    where
        F: FnOnce(&Snapshot) + Send + 'static,
    {
        self.send(DispatchTask::Call(Box::new(call)))
    }

    /// The last-delivered snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    pub fn phase(&self) -> DispatchPhase {
        *self.phase.lock()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// True when called from the worker thread itself (inside a callback)
    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.worker_thread
    }

    /// Stop delivery
    ///
    /// No task is accepted afterwards and queued cycles are discarded. A
    /// cycle already being delivered completes. When called from outside the
    /// worker this waits for the worker thread to exit.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(DispatchTask::Shutdown);
        info!("Dispatch worker released");

        if self.is_worker_thread() {
            return;
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::warn!("Dispatch worker panicked during shutdown");
            }
        }
    }
}

impl fmt::Debug for DispatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchHandle")
            .field("released", &self.is_released())
            .field("phase", &self.phase())
            .finish()
    }
}
