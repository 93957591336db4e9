//! Legacy Session Adapter
//!
//! Projects a capability-filtered [`Snapshot`](session_model::Snapshot) onto
//! the fixed-shape state older controllers understand: one playback state
//! enum, an action bitmask, a queue list and a metadata bundle.
//!
//! # Example
//!
//! ```rust
//! use session_legacy::{to_legacy, LegacyConfig, LegacyPlaybackState};
//! use session_model::{filter, CapabilitySet, PlaybackState, Snapshot};
//!
//! let snapshot = Snapshot::default()
//!     .with_playback_state(PlaybackState::Ready)
//!     .with_play_when_ready(true);
//! let filtered = filter(&snapshot, &CapabilitySet::default_for_controller());
//!
//! let legacy = to_legacy(&filtered, &LegacyConfig::default());
//! assert_eq!(legacy.state, LegacyPlaybackState::Playing);
//! ```

pub mod actions;
pub mod adapter;
pub mod modes;
pub mod queue;
pub mod state;

pub use actions::{LegacyActions, VolumeControl};
pub use adapter::{
    buffered_percentage, to_legacy, CustomAction, LegacyConfig, LegacyError, LegacyState,
    EXTRAS_KEY_MEDIA_ID, EXTRAS_KEY_PLAYBACK_SPEED, POSITION_UNKNOWN,
};
pub use modes::{LegacyRepeatMode, LegacyShuffleMode};
pub use queue::{
    build_queue, queue_item_id, truncate_by_size, QueueItem, DEFAULT_QUEUE_SIZE_LIMIT_BYTES,
    UNKNOWN_QUEUE_ID,
};
pub use state::{decide, LegacyPlaybackState, StateDecision};
