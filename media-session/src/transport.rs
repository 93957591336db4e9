//! Session → controller transport seam
//!
//! The session only needs ordered, lossless delivery per connection. A
//! failed send is treated as the controller having gone away.

use std::sync::mpsc;

use thiserror::Error;

use crate::protocol::{ControllerId, ControllerMessage};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The receiving side is gone
    #[error("transport to {0} is closed")]
    Closed(ControllerId),

    #[error("transport to {controller} failed: {reason}")]
    Failed {
        controller: ControllerId,
        reason: String,
    },
}

/// Carries messages from the session to one controller
///
/// Implementations must preserve order and must not drop or duplicate
/// messages while `send` keeps returning `Ok`.
pub trait Transport: Send {
    fn send(&self, controller: &ControllerId, message: ControllerMessage)
        -> Result<(), TransportError>;
}

/// In-process transport backed by an mpsc channel
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<ControllerMessage>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::Sender<ControllerMessage>) -> Self {
        Self { tx }
    }

    /// Transport plus the receiving end for the controller side
    pub fn pair() -> (Self, mpsc::Receiver<ControllerMessage>) {
        let (tx, rx) = mpsc::channel();
        (Self::new(tx), rx)
    }
}

impl Transport for ChannelTransport {
    fn send(
        &self,
        controller: &ControllerId,
        message: ControllerMessage,
    ) -> Result<(), TransportError> {
        self.tx
            .send(message)
            .map_err(|_| TransportError::Closed(controller.clone()))
    }
}
