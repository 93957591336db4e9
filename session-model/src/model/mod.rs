//! Model types for session-model

mod device;
mod extras;
mod layout;
mod media_item;
mod playback;
mod snapshot;
mod text;
mod timeline;

pub use device::{DeviceInfo, DeviceState, PlaybackType};
pub use extras::Extras;
pub use layout::CommandButton;
pub use media_item::{MediaItem, MediaMetadata};
pub use playback::{
    DiscontinuityReason, PlaybackParameters, PlaybackState, PlayerError, PositionInfo, RepeatMode,
    SuppressionReason,
};
pub use snapshot::{Snapshot, SnapshotBuilder};
pub use text::Cue;
pub use timeline::Timeline;
