//! Media Session Dispatch
//!
//! Serialized delivery of change cycles to one controller's listeners.
//!
//! # Features
//!
//! - **One Cycle At A Time**: a dedicated worker thread drains an ordered
//!   task queue; a cycle is fully delivered before the next one starts
//! - **Reentrancy Safe**: work triggered from inside a callback is queued
//!   and delivered as a later cycle, never folded into the current one
//! - **Failure Isolation**: a panicking listener is logged and skipped;
//!   repeated failures unregister it
//! - **Blocking Iteration**: [`CycleIterator`] for synchronous consumers
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use session_dispatch::{spawn_dispatch_worker, DispatchConfig, EventsListener};
//! use session_model::{Cycle, FieldChange, Snapshot};
//!
//! let handle = spawn_dispatch_worker(DispatchConfig::default(), Snapshot::default())?;
//! handle.add_listener(Box::new(EventsListener::new(|snapshot, events| {
//!     println!("v{}: {:?}", snapshot.version(), events);
//! })))?;
//!
//! let cycles = handle.subscribe()?;
//! handle.enqueue_cycle(Cycle::new(1, vec![FieldChange::PlayWhenReady(true)]))?;
//!
//! let delivered = cycles.recv_timeout(Duration::from_secs(1)).unwrap();
//! assert_eq!(delivered.version, 1);
//! handle.release();
//! # Ok::<(), session_dispatch::DispatchError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! DispatchHandle ──(mpsc DispatchTask)──► worker thread
//!                                            │
//!                                            └── Dispatcher
//!                                                  ├── ListenerSet (registration order)
//!                                                  ├── last-delivered Snapshot
//!                                                  └── subscribers ──► CycleIterator
//! ```

pub mod dispatcher;
pub mod error;
pub mod iter;
pub mod listener;
pub mod worker;

pub use dispatcher::{DispatchPhase, Dispatcher};
pub use error::{DispatchError, Result};
pub use iter::{CycleIterator, DeliveredCycle, TimeoutIter, TryIter};
pub use listener::{EventsListener, Listener, ListenerId, ListenerSet};
pub use worker::{spawn_dispatch_worker, DispatchConfig, DispatchHandle, DispatchTask};
