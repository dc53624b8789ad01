//! # Core Errors
//!
//! Error taxonomy of the dispatch core. Registration-time variants are fatal and
//! abort startup; runtime variants are isolated to a single event or group and only logged.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or ambiguous command specification.
    #[error("invalid command specification: {0}")]
    InvalidSpecification(String),

    /// A literal command name collides with one that is already registered.
    #[error("command `{name}` is already registered by `{existing}`")]
    DuplicateCommand { name: String, existing: String },

    /// A handler returned an error or panicked while processing one event.
    #[error("handler `{handler}` failed: {reason}")]
    HandlerExecution { handler: String, reason: String },

    /// A flush callback failed; the flushed items are discarded.
    #[error("flush of group `{group}` failed: {reason}")]
    Flush { group: String, reason: String },

    /// The cache collaborator rejected a request.
    #[error("cache error: {0}")]
    Cache(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
