//! Single-cycle delivery state machine
//!
//! ```text
//! Idle ──► Delivering(0) ──► ... ──► Delivering(n-1) ──► DeliveringAggregate ──► Idle
//! ```
//!
//! The dispatcher never folds new work into a cycle in progress. Anything a
//! listener triggers while a cycle is being delivered reaches the worker
//! queue and becomes a later cycle.

use std::sync::{mpsc, Arc};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use session_model::{Cycle, Snapshot};

use crate::iter::DeliveredCycle;
use crate::listener::{Listener, ListenerId, ListenerSet};

/// Where the dispatcher is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPhase {
    #[default]
    Idle,
    /// Delivering the field change at this position of the cycle
    Delivering(usize),
    DeliveringAggregate,
}

/// Owns a controller's listeners and last-delivered snapshot
///
/// The snapshot cell is shared with readers on other threads; it is swapped
/// for the new value before any callback of the cycle runs, so listeners
/// reading it see the cycle's result.
pub struct Dispatcher {
    listeners: ListenerSet,
    snapshot: Arc<RwLock<Arc<Snapshot>>>,
    phase: Arc<Mutex<DispatchPhase>>,
    subscribers: Vec<mpsc::Sender<DeliveredCycle>>,
}

impl Dispatcher {
    pub fn new(initial: Snapshot, max_listener_failures: u32) -> Self {
        Self {
            listeners: ListenerSet::new(max_listener_failures),
            snapshot: Arc::new(RwLock::new(Arc::new(initial))),
            phase: Arc::new(Mutex::new(DispatchPhase::Idle)),
            subscribers: Vec::new(),
        }
    }

    /// Shared cell holding the last-delivered snapshot
    pub fn snapshot_cell(&self) -> Arc<RwLock<Arc<Snapshot>>> {
        Arc::clone(&self.snapshot)
    }

    /// Shared cell holding the current phase
    pub fn phase_cell(&self) -> Arc<Mutex<DispatchPhase>> {
        Arc::clone(&self.phase)
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    pub fn phase(&self) -> DispatchPhase {
        *self.phase.lock()
    }

    pub fn add_listener(&mut self, id: ListenerId, listener: Box<dyn Listener>) {
        self.listeners.add(id, listener);
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn subscribe(&mut self, tx: mpsc::Sender<DeliveredCycle>) {
        self.subscribers.push(tx);
    }

    /// Deliver one cycle
    ///
    /// Returns false when the cycle was empty or could not be applied to the
    /// last-delivered snapshot; nothing is delivered in either case and the
    /// stored snapshot is left untouched.
    pub fn deliver(&mut self, cycle: Cycle) -> bool {
        if cycle.is_empty() {
            return false;
        }

        let current = self.snapshot();
        let next = match current.apply_all(&cycle.changes) {
            Ok(next) => Arc::new(next.with_version(cycle.version)),
            Err(e) => {
                warn!(
                    "Dropping cycle v{}: cannot apply to v{}: {}",
                    cycle.version,
                    current.version(),
                    e
                );
                return false;
            }
        };
        *self.snapshot.write() = Arc::clone(&next);

        let events = cycle.event_set();
        debug!(
            "Delivering cycle v{} ({} fields) to {} listener(s)",
            cycle.version,
            events.len(),
            self.listeners.len()
        );

        for (index, change) in cycle.changes.iter().enumerate() {
            self.set_phase(DispatchPhase::Delivering(index));
            self.listeners.deliver_field(change);
        }

        self.set_phase(DispatchPhase::DeliveringAggregate);
        self.listeners.deliver_events(&next, &events);

        let delivered = DeliveredCycle {
            version: cycle.version,
            events,
            snapshot: next,
        };
        self.subscribers
            .retain(|tx| tx.send(delivered.clone()).is_ok());

        self.set_phase(DispatchPhase::Idle);
        self.listeners.end_cycle();
        true
    }

    fn set_phase(&self, phase: DispatchPhase) {
        *self.phase.lock() = phase;
    }
}
