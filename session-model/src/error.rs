//! Error types for session-model

use thiserror::Error;

/// Result type for session-model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Invariant violations rejected when a [`Snapshot`](crate::Snapshot) is built
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Current index set while the timeline is empty, or past its end
    #[error("current index {index:?} is invalid for a timeline of {len} items")]
    CurrentIndexOutOfBounds { index: Option<usize>, len: usize },

    /// Shuffle order is not a permutation of the timeline indices
    #[error("shuffle order {order:?} is not a permutation of 0..{len}")]
    InvalidShuffleOrder { order: Vec<usize>, len: usize },

    /// Speed or pitch not finite and positive
    #[error("invalid playback parameters: speed {speed}, pitch {pitch}")]
    InvalidPlaybackParameters { speed: f32, pitch: f32 },

    /// Player volume outside 0.0..=1.0
    #[error("player volume {0} is outside 0.0..=1.0")]
    VolumeOutOfRange(f32),

    /// Device volume outside the range the device reports
    #[error("device volume {volume} is outside {min}..={max}")]
    DeviceVolumeOutOfRange { volume: u32, min: u32, max: u32 },

    /// Device reports a minimum above its maximum
    #[error("device volume range {min}..={max} is empty")]
    InvalidDeviceRange { min: u32, max: u32 },
}
