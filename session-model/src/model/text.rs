use serde::{Deserialize, Serialize};

/// A text cue (subtitle, caption) currently on screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    pub text: String,
}

impl Cue {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
