//! Lookup failure taxonomy.

use std::time::Duration;

use thiserror::Error;

/// The one message shown to users for every failed lookup.
pub const LOOKUP_FAILED_MESSAGE: &str = "City not found";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("No match for city '{0}'")]
    NotFound(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Lookup timed out after {0:?}")]
    TimedOut(Duration),
}

impl LookupError {
    /// User-facing message. Causes are deliberately not distinguished.
    pub fn user_message(&self) -> &'static str {
        LOOKUP_FAILED_MESSAGE
    }

    /// Whether the failure happened before a usable response arrived.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::TimedOut(_))
    }
}
