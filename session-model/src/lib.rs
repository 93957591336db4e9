//! Media Session Model
//!
//! Value types shared by sessions and controllers: capability sets, the
//! immutable player [`Snapshot`], capability filtering and the change engine
//! that turns two snapshots into an ordered delivery cycle.
//!
//! # Features
//!
//! - **Capability Sets**: bit sets of player commands plus session commands,
//!   with O(1) permission checks
//! - **Validated Snapshots**: built only through [`SnapshotBuilder`], so every
//!   value is self-consistent
//! - **Capability Filtering**: gated fields degrade to defaults instead of
//!   leaking data
//! - **Change Engine**: per-field events in canonical order plus one aggregate
//!
//! # Quick Start
//!
//! ```rust
//! use session_model::{
//!     CapabilitySet, ChangeEngine, ChangeEvent, FieldTag, MediaItem, PlayerCommand, Snapshot,
//!     Timeline,
//! };
//!
//! let previous = Snapshot::builder()
//!     .timeline(Timeline::new(vec![
//!         MediaItem::titled("a", "First"),
//!         MediaItem::titled("b", "Second"),
//!     ]))
//!     .current_index(Some(0))
//!     .build()
//!     .unwrap();
//! let next = previous.with_current_index(Some(1)).unwrap();
//!
//! let caps = CapabilitySet::default_for_controller();
//! let events = ChangeEngine::diff(&previous, &next, &caps);
//! assert!(matches!(events.last(), Some(ChangeEvent::Events(set)) if set.contains(FieldTag::CurrentItem)));
//!
//! // Without GetTimeline the controller only ever sees the current item
//! let limited = caps.without_player(PlayerCommand::GetTimeline);
//! let visible = session_model::filter(&next, &limited);
//! assert_eq!(visible.timeline().len(), 1);
//! ```
//!
//! # Architecture
//!
//! ```text
//! Snapshot (raw, session-owned)
//!     │
//!     ├── filter(snapshot, capabilities) ──► Snapshot (filtered, per controller)
//!     │
//!     └── ChangeEngine::diff(prev, next, capabilities)
//!             │
//!             └── [Field(..), Field(..), ..., Events(EventSet)]
//! ```

pub mod change;
pub mod commands;
pub mod diff;
pub mod error;
pub mod filter;
pub mod model;

pub use change::{ChangeEvent, Cycle, EventSet, FieldChange, FieldTag};
pub use commands::{
    CapabilitySet, Operation, PlayerCommand, PlayerCommands, SessionCommand, SessionCommandCode,
    SessionCommands,
};
pub use diff::ChangeEngine;
pub use error::{ModelError, Result};
pub use filter::{filter, filter_cues, filter_metadata, filter_timeline};
pub use model::{
    CommandButton, Cue, DeviceInfo, DeviceState, DiscontinuityReason, Extras, MediaItem,
    MediaMetadata, PlaybackParameters, PlaybackState, PlaybackType, PlayerError, PositionInfo,
    RepeatMode, Snapshot, SnapshotBuilder, SuppressionReason, Timeline,
};
