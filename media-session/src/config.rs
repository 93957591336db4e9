//! Session configuration

use serde::{Deserialize, Serialize};

use session_legacy::{LegacyConfig, DEFAULT_QUEUE_SIZE_LIMIT_BYTES};

use crate::error::Result;

/// Settings shared by a session and the controllers connected to it
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust
/// use media_session::SessionConfig;
///
/// let config = SessionConfig::from_json_str(r#"{ "hide_play_suppression": true }"#).unwrap();
/// assert!(config.hide_play_suppression);
/// assert_eq!(config.max_listener_failures, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Legacy peers see suppressed playback as playing at speed 0
    pub hide_play_suppression: bool,
    /// Ceiling for the encoded legacy queue
    pub legacy_queue_size_limit_bytes: usize,
    /// Consecutive failed cycles before a controller listener is dropped
    pub max_listener_failures: u32,
    /// Prefix for the names of worker threads
    pub worker_thread_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            hide_play_suppression: false,
            legacy_queue_size_limit_bytes: DEFAULT_QUEUE_SIZE_LIMIT_BYTES,
            max_listener_failures: 3,
            worker_thread_prefix: "media-session".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Settings for the legacy projection
    pub fn legacy(&self) -> LegacyConfig {
        LegacyConfig {
            hide_play_suppression: self.hide_play_suppression,
            queue_size_limit_bytes: self.legacy_queue_size_limit_bytes,
        }
    }

    pub(crate) fn thread_name(&self, role: &str) -> String {
        format!("{}-{}", self.worker_thread_prefix, role)
    }
}
