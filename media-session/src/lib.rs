//! Media Session
//!
//! One [`Session`] owns the playback state of a single logical player and
//! shares it with any number of [`Controller`]s, each seeing only what its
//! capability set allows.
//!
//! # Features
//!
//! - **Capability Negotiation**: the session decides per controller which
//!   commands it may send and which state it may read
//! - **Ordered Change Cycles**: every state change reaches each controller
//!   as one cycle of per-field callbacks followed by a single aggregate
//! - **Reentrant Listeners**: commands issued from a callback take effect in
//!   a later cycle
//! - **Legacy Projection**: the same state folded onto the older
//!   single-enum shape for legacy peers
//! - **Sync API**: plain threads and channels, no async runtime required
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use media_session::{Controller, Session};
//! use session_dispatch::EventsListener;
//! use session_model::{FieldTag, MediaItem, Timeline};
//!
//! let session = Session::builder().build()?;
//! session.update(|state| {
//!     state
//!         .timeline(Timeline::new(vec![
//!             MediaItem::titled("a", "First"),
//!             MediaItem::titled("b", "Second"),
//!         ]))
//!         .current_index(Some(0))
//! })?;
//!
//! let controller = Controller::connect(&session, "remote")?;
//! controller.add_listener(EventsListener::new(|snapshot, events| {
//!     if events.contains(FieldTag::CurrentItem) {
//!         println!("now at {:?}", snapshot.current_index());
//!     }
//! }))?;
//!
//! let cycles = controller.iter()?;
//! controller.seek_to_next()?.wait();
//! let cycle = cycles.recv_timeout(Duration::from_secs(1)).unwrap();
//! assert_eq!(cycle.snapshot.current_index(), Some(1));
//!
//! controller.release();
//! session.release();
//! # Ok::<(), media_session::SessionError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────── session worker ─────────────────────────┐
//! │ raw Snapshot ── filter(caps) ── ChangeEngine::cycle ── Transport │
//! │ PlayerBackend / SessionCallback execute accepted commands        │
//! └──────────────────────────────┬───────────────────────────────────┘
//!                                │ ControllerMessage (ordered per controller)
//!                  ┌─────────────▼─────────────┐
//!                  │ controller link thread    │── CommandResult ──► PendingResult
//!                  └─────────────┬─────────────┘
//!                                │ Cycle
//!                  ┌─────────────▼─────────────┐
//!                  │ controller dispatch worker│── Listener / CycleIterator
//!                  └───────────────────────────┘
//! ```

pub mod callback;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod player;
pub mod protocol;
pub mod session;
pub mod transport;

pub use callback::{AcceptAll, ConnectDecision, ControllerInfo, SessionCallback};
pub use config::SessionConfig;
pub use controller::{Controller, PendingResult};
pub use error::{Result, SessionError};
pub use logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};
pub use player::{
    CompletionToken, PlayerBackend, PlayerContext, SimplePlayer, MAX_SEEK_TO_PREVIOUS_POSITION_MS,
    SEEK_BACK_INCREMENT_MS, SEEK_FORWARD_INCREMENT_MS,
};
pub use protocol::{
    CapabilityUpdate, CommandArgs, CommandRequest, CommandResult, ConnectRequest, ConnectResult,
    ControllerId, ControllerMessage, RejectReason, ResultCode, SessionMessage, StateDelta,
};
pub use session::{Session, SessionBuilder};
pub use transport::{ChannelTransport, Transport, TransportError};

// Re-export the lower layers so users need only this crate
pub use session_dispatch as dispatch;
pub use session_legacy as legacy;
pub use session_model as model;
