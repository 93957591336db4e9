//! Error types for media-session

use thiserror::Error;

use session_dispatch::DispatchError;
use session_model::ModelError;

use crate::protocol::{ControllerId, RejectReason};
use crate::transport::TransportError;

/// Result type for session and controller operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors raised by [`crate::Session`] and [`crate::Controller`]
#[derive(Error, Debug)]
pub enum SessionError {
    /// The session or controller was released
    #[error("session has been released")]
    Released,

    #[error("controller not connected: {0}")]
    ControllerNotFound(ControllerId),

    #[error("controller already connected: {0}")]
    DuplicateController(ControllerId),

    /// The session refused the connection
    #[error("connection rejected: {0:?}")]
    Rejected(RejectReason),

    /// A state update would have broken a snapshot invariant
    #[error("invalid state: {0}")]
    Model(#[from] ModelError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The session worker stopped without answering
    #[error("session worker disconnected")]
    WorkerDisconnected,

    /// A blocking session call was made from the session's own worker
    #[error("blocking session call from inside a session callback")]
    ReentrantCall,

    #[error("failed to spawn worker thread: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
