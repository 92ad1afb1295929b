//! Relay-wide error types
//!
//! Every failure that can reach an agent is one of these variants. The
//! dispatcher turns them into error-flagged tool results, so the `Display`
//! text is what the agent ends up reading.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Relay-wide error type
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "message")]
pub enum RelayError {
    /// Malformed or missing arguments, caught before any side effect
    #[error("{0}")]
    Validation(String),

    /// Error reported by the host plugin, passed through verbatim
    #[error("{0}")]
    Host(String),

    /// Forwarded call exceeded its deadline
    #[error("Request to host timed out after {0}ms")]
    Timeout(u64),

    /// The host connection carrying the call went away
    #[error("{0}")]
    Disconnected(String),

    /// Operation the relay refuses to run (e.g. nested batches)
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RelayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn host(message: impl Into<String>) -> Self {
        Self::Host(message.into())
    }

    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::Disconnected(message.into())
    }

    /// Short machine-readable kind, used in logs and batch results
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Validation(_) => "validation",
            RelayError::Host(_) => "host",
            RelayError::Timeout(_) => "timeout",
            RelayError::Disconnected(_) => "disconnected",
            RelayError::Unsupported(_) => "unsupported",
            RelayError::Io(_) => "io",
            RelayError::Serialization(_) => "serialization",
            RelayError::Config(_) => "config",
        }
    }
}

impl From<RelayError> for String {
    fn from(error: RelayError) -> String {
        error.to_string()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, RelayError>;

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for RelayError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Validation(format!("Invalid base64 payload: {err}"))
    }
}
