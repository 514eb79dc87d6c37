//! Error types for session supervision and bulk dispatch

use thiserror::Error;

/// Main error type for the relay
#[derive(Error, Debug)]
pub enum RelayError {
    /// Transient connection failure; drives the reconnect path
    #[error("Connection error: {0}")]
    Connection(String),

    /// Unrecoverable closure (logged out or invalid credentials)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// A single message could not be delivered
    #[error("Send error: {0}")]
    Send(String),

    /// Submission rejected before any task was created
    #[error("Validation error: {0}")]
    Validation(String),

    /// No session registered under the given id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session exists but cannot currently be used
    #[error("Session {0} is not connected")]
    SessionUnavailable(String),

    /// No task registered under the given id
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Credential persistence failure
    #[error("Credential store error: {0}")]
    Credentials(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create a send error
    pub fn send(msg: impl Into<String>) -> Self {
        Self::Send(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a session not found error
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound(session_id.into())
    }

    /// Create a session unavailable error
    pub fn session_unavailable(session_id: impl Into<String>) -> Self {
        Self::SessionUnavailable(session_id.into())
    }

    /// Create a task not found error
    pub fn task_not_found(task_id: impl Into<String>) -> Self {
        Self::TaskNotFound(task_id.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a credential store error
    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::Credentials(msg.into())
    }

    /// Whether this error should be treated as transient by the supervisor
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Io(_))
    }
}
