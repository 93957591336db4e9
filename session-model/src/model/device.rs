//! Output device and volume

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackType {
    /// Audio rendered on this device
    #[default]
    Local,
    /// Audio rendered on a remote device (cast, network speaker)
    Remote,
}

/// Static description of the output device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub playback_type: PlaybackType,
    pub min_volume: u32,
    pub max_volume: u32,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            playback_type: PlaybackType::Local,
            min_volume: 0,
            max_volume: 0,
        }
    }
}

/// Device info, device volume and mute flag, plus the player volume
///
/// `player_volume` is the player's own gain in `0.0..=1.0`, independent of
/// the device volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub info: DeviceInfo,
    pub volume: u32,
    pub muted: bool,
    pub player_volume: f32,
}

impl DeviceState {
    pub fn new(info: DeviceInfo, volume: u32) -> Self {
        Self {
            info,
            volume,
            muted: false,
            player_volume: 1.0,
        }
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new(DeviceInfo::default(), 0)
    }
}
