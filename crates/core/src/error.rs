//! Error types for spanstore
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Two layers exist:
//! - [`SessionError`]: failures reported by the database session (external collaborator)
//! - [`Error`]: everything a caller of the store can observe, with session
//!   failures wrapped unchanged in [`Error::Upstream`]

use std::time::Duration;
use thiserror::Error;

/// Result type alias for spanstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for session operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Failures reported by the database session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No replica could serve the request
    #[error("session unavailable: {0}")]
    Unavailable(String),

    /// The session gave up waiting for a response
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The statement was rejected (syntax, arity, unsupported restriction)
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The statement names a table the keyspace does not contain
    #[error("unknown table: {0}")]
    UnknownTable(String),
}

/// Error types for the store
#[derive(Debug, Error)]
pub enum Error {
    /// A call instance was executed more than once
    #[error("Call already executed: {0}")]
    AlreadyExecuted(String),

    /// A call was canceled before it delivered a result
    #[error("Call canceled: {0}")]
    Canceled(String),

    /// The session reported a failure; the original cause is preserved
    #[error("Upstream failure: {0}")]
    Upstream(#[from] SessionError),

    /// A row was missing a column or held an undecodable value
    #[error("Decode error: {0}")]
    Decode(String),

    /// Caller-supplied input was rejected
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be read or failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// No async runtime was available, or a spawned call panicked
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl Error {
    /// Create an invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Error::Decode(msg.into())
    }

    /// True if this error came from the session rather than this crate
    pub fn is_upstream(&self) -> bool {
        matches!(self, Error::Upstream(_))
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::Decode(e.to_string())
    }
}
