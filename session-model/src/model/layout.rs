//! Custom layout buttons

use serde::{Deserialize, Serialize};

use super::Extras;
use crate::commands::{CapabilitySet, Operation};

/// A button offered to controllers, bound to an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandButton {
    pub display_name: String,
    pub icon_uri: Option<String>,
    pub operation: Operation,
    pub extras: Extras,
    /// Whether the session marks this button as usable
    pub enabled: bool,
}

impl CommandButton {
    pub fn new(display_name: impl Into<String>, operation: impl Into<Operation>) -> Self {
        Self {
            display_name: display_name.into(),
            icon_uri: None,
            operation: operation.into(),
            extras: Extras::new(),
            enabled: true,
        }
    }

    pub fn with_icon_uri(mut self, uri: impl Into<String>) -> Self {
        self.icon_uri = Some(uri.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether the bound operation is allowed by `capabilities`
    pub fn is_allowed_by(&self, capabilities: &CapabilitySet) -> bool {
        capabilities.is_allowed(&self.operation)
    }
}
