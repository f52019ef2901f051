//! Error types for PlayerView Core

use thiserror::Error;

use crate::backend::{BackendError, ObservedKey};
use crate::types::ObjectId;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Programming errors
    #[error("Internal invariant violated: {0}")]
    InvariantViolation(#[from] InvariantViolation),

    // Backend errors
    #[error("Media backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Asset not playable: unresolved keys {0}")]
    AssetNotPlayable(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    // Runtime errors
    #[error("Player controller is closed")]
    ControllerClosed,
}

impl Error {
    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Backend(_))
    }

    /// Returns the error code for logs and diagnostics
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvariantViolation(_) => "INVARIANT",
            Error::Backend(_) => "BACKEND",
            Error::AssetNotPlayable(_) => "ASSET",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::ConfigParse(_) => "CONFIG_PARSE",
            Error::ControllerClosed => "CLOSED",
        }
    }
}

/// A subscription or teardown bug: an observation that can never be
/// produced by a correctly wired backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    #[error("`{subject}` reported by {object}, but the tracked object is {expected:?}")]
    UnexpectedObject {
        subject: &'static str,
        object: ObjectId,
        expected: Option<ObjectId>,
    },

    #[error("`{key}` delivered a {value} value")]
    UnexpectedValue { key: ObservedKey, value: &'static str },

    #[error("{event} cannot be delivered in {scope} scope")]
    WrongScope {
        event: &'static str,
        scope: &'static str,
    },

    #[error("probe completed twice for session {session}")]
    DuplicateProbe { session: String },
}
