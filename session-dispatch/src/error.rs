//! Error types for session-dispatch

use thiserror::Error;

/// Result type for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Errors raised by the dispatch worker handle
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The worker was released; no further tasks are accepted
    #[error("dispatch worker has been released")]
    Released,

    /// The worker thread exited unexpectedly
    #[error("dispatch worker disconnected")]
    WorkerDisconnected,

    /// The worker thread could not be started
    #[error("failed to spawn dispatch worker: {0}")]
    SpawnFailed(#[from] std::io::Error),
}
