//! Messages exchanged between a session and its controllers
//!
//! Every message is plain data with `serde` derives so a transport can
//! carry it across a process boundary. The in-process
//! [`crate::ChannelTransport`] moves them as values.

use std::fmt;

use serde::{Deserialize, Serialize};

use session_legacy::LegacyState;
use session_model::{
    CapabilitySet, Cycle, Extras, FieldChange, MediaItem, MediaMetadata, Operation, RepeatMode,
    Snapshot,
};

// ============================================================================
// Identity and handshake
// ============================================================================

/// Identifier chosen by a controller when it connects
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControllerId(String);

impl ControllerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ControllerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ControllerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub controller_id: ControllerId,
    /// The peer only understands the legacy state shape
    pub legacy: bool,
}

impl ConnectRequest {
    pub fn new(controller_id: impl Into<ControllerId>) -> Self {
        Self {
            controller_id: controller_id.into(),
            legacy: false,
        }
    }

    pub fn legacy(controller_id: impl Into<ControllerId>) -> Self {
        Self {
            controller_id: controller_id.into(),
            legacy: true,
        }
    }
}

/// Why a session refused a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The session callback declined the controller
    NotAllowed,
    /// A controller with the same id is already connected
    DuplicateController,
    SessionReleased,
    Other(String),
}

/// Outcome of the handshake
///
/// On acceptance carries the controller's capabilities and its initial
/// filtered snapshot; on rejection only the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectResult {
    pub accepted: bool,
    pub capabilities: Option<CapabilitySet>,
    pub snapshot: Option<Snapshot>,
    pub reject_reason: Option<RejectReason>,
}

impl ConnectResult {
    pub fn accepted(capabilities: CapabilitySet, snapshot: Snapshot) -> Self {
        Self {
            accepted: true,
            capabilities: Some(capabilities),
            snapshot: Some(snapshot),
            reject_reason: None,
        }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        Self {
            accepted: false,
            capabilities: None,
            snapshot: None,
            reject_reason: Some(reason),
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Arguments of a command; which variant applies depends on the operation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandArgs {
    #[default]
    None,
    PlayWhenReady(bool),
    SeekTo {
        position_ms: u64,
    },
    SeekToItem {
        index: usize,
        position_ms: u64,
    },
    RepeatMode(RepeatMode),
    Shuffle(bool),
    Speed(f32),
    Volume(f32),
    DeviceVolume(u32),
    AdjustDeviceVolume(i32),
    MediaItem(MediaItem),
    MediaItems {
        items: Vec<MediaItem>,
        start_index: usize,
    },
    Metadata(MediaMetadata),
    /// Arguments of a custom session command
    Custom(Extras),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub controller_id: ControllerId,
    /// Per-controller sequence number, echoed in the result
    pub seq: u64,
    /// Last snapshot version the controller had seen when sending
    pub known_version: u64,
    pub operation: Operation,
    pub args: CommandArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    Success,
    /// Operation not in the controller's capability set
    PermissionDenied,
    /// Arguments missing, of the wrong kind or out of range
    BadValue,
    /// Valid arguments that do not apply to the current state
    InvalidState,
    NotSupported,
    /// A deferred command was dropped without a result
    Cancelled,
    /// The session or controller went away before a result was produced
    Disconnected,
}

impl ResultCode {
    pub fn is_success(&self) -> bool {
        matches!(self, ResultCode::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub seq: u64,
    /// False when the command was never executed
    pub accepted: bool,
    pub result_code: ResultCode,
}

impl CommandResult {
    /// Result of an executed command
    pub fn executed(seq: u64, result_code: ResultCode) -> Self {
        Self {
            seq,
            accepted: true,
            result_code,
        }
    }

    pub fn rejected(seq: u64) -> Self {
        Self {
            seq,
            accepted: false,
            result_code: ResultCode::PermissionDenied,
        }
    }

    pub fn disconnected(seq: u64) -> Self {
        Self {
            seq,
            accepted: false,
            result_code: ResultCode::Disconnected,
        }
    }

    pub fn is_success(&self) -> bool {
        self.accepted && self.result_code.is_success()
    }
}

// ============================================================================
// State
// ============================================================================

/// One cycle of filtered field changes for one controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDelta {
    pub controller_id: ControllerId,
    pub version: u64,
    pub changes: Vec<FieldChange>,
}

impl StateDelta {
    pub fn into_cycle(self) -> Cycle {
        Cycle::new(self.version, self.changes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityUpdate {
    pub controller_id: ControllerId,
    pub capabilities: CapabilitySet,
}

// ============================================================================
// Envelopes
// ============================================================================

/// Session → controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "body")]
pub enum ControllerMessage {
    /// Sent before the state delta the new capabilities cause
    Capabilities(CapabilityUpdate),
    State(StateDelta),
    CommandResult(CommandResult),
    /// Legacy projection, sent to legacy peers only when it changed
    Legacy(Box<LegacyState>),
    /// The session dropped this controller; nothing follows
    Disconnected,
}

/// Controller → session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "body")]
pub enum SessionMessage {
    Command(CommandRequest),
    Disconnect(ControllerId),
}
