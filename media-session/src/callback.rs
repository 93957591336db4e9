//! Session-side hooks for connections and session commands

use serde::{Deserialize, Serialize};

use session_model::{CapabilitySet, SessionCommand};

use crate::player::PlayerContext;
use crate::protocol::{CommandArgs, ControllerId, RejectReason, ResultCode};

/// What the session knows about a connected or connecting controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerInfo {
    pub id: ControllerId,
    pub legacy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectDecision {
    Accept(CapabilitySet),
    Reject(RejectReason),
}

/// Hooks run on the session worker
///
/// Calls that block on the session (such as [`crate::Session::update`])
/// fail with [`crate::SessionError::ReentrantCall`] from here; use the
/// [`PlayerContext`] instead.
pub trait SessionCallback: Send {
    /// Decide whether to accept a controller and with which capabilities
    fn on_connect(&mut self, controller: &ControllerInfo) -> ConnectDecision {
        let _ = controller;
        ConnectDecision::Accept(CapabilitySet::default_for_controller())
    }

    fn on_disconnected(&mut self, _controller: &ControllerInfo) {}

    /// Execute a session command the controller is allowed to send
    fn on_custom_command(
        &mut self,
        _controller: &ControllerInfo,
        _command: &SessionCommand,
        _args: &CommandArgs,
        _player: &mut PlayerContext<'_>,
    ) -> ResultCode {
        ResultCode::NotSupported
    }
}

/// Accepts every controller with the default capabilities
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl SessionCallback for AcceptAll {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_all_grants_defaults() {
        let info = ControllerInfo {
            id: "c".into(),
            legacy: false,
        };
        assert_eq!(
            AcceptAll.on_connect(&info),
            ConnectDecision::Accept(CapabilitySet::default_for_controller())
        );
    }
}
