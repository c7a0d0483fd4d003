//! Error types shared across the server.

use thiserror::Error;

// ============================================================================
// Backend errors
// ============================================================================

/// Failure raised by the memory backend boundary.
///
/// The retry layer consults [`BackendError::is_retryable`] to decide whether
/// an attempt may be repeated. Validation failures are rejected before the
/// first network call and are never retried.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Arguments rejected before any request was made.
    #[error("{0}")]
    InvalidInput(String),

    /// The backend answered with a non-success HTTP status.
    #[error("backend returned status {status}: {message}")]
    Api { status: u16, message: String },

    /// The request never completed (connect failure, timeout, bad body).
    #[error("request failed: {0}")]
    Transport(String),
}

impl BackendError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        BackendError::InvalidInput(message.into())
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        BackendError::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether the retry layer may repeat the attempt that produced this error.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, BackendError::InvalidInput(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Transport(err.to_string())
    }
}

// ============================================================================
// Tool errors
// ============================================================================

/// Failure raised by tool registry lookup or invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool registered under the requested name.
    #[error("unknown tool: {0}")]
    NotFound(String),

    /// Arguments did not match the tool's parameter schema.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// The tool ran but failed.
    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        ToolError::InvalidParams(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        ToolError::Execution(message.into())
    }
}

// ============================================================================
// Transport errors
// ============================================================================

/// Failure raised when a message cannot be handed to a session.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The session id is not present in the registry.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The session is being torn down and no longer accepts messages.
    #[error("session closed: {0}")]
    SessionClosed(String),
}

/// Session id allocation collided with live sessions too many times.
#[derive(Debug, Error)]
#[error("could not allocate a unique session id")]
pub struct SessionIdExhausted;
