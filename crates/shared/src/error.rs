//! Error taxonomy for the harness.
//!
//! Persistence failures deliberately have no variant here: the storage layer
//! swallows them by contract and callers never see them.

use thiserror::Error;

/// Errors surfaced by the harness core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// A required field was empty before a network action; the action was not
    /// attempted.
    #[error("missing required field: {field}")]
    Validation { field: &'static str },

    /// Socket-level failure. The connection manager reports this and schedules
    /// an automatic reconnect.
    #[error("transport error: {0}")]
    Transport(String),

    /// A well-formed ERROR frame from the broker. Reported, never retried
    /// automatically.
    #[error("broker error: {message}")]
    Protocol { message: String, detail: String },

    /// Provisioning endpoint answered with a non-success status.
    #[error("provisioning failed (HTTP {status}): {message}")]
    Provisioning { status: u16, message: String },

    /// Provisioning succeeded at the HTTP level but the body carried no
    /// session token.
    #[error("provisioning response missing sessionToken")]
    MalformedProvisioning,

    /// An operation that needs a live connection was invoked without one.
    #[error("not connected")]
    NotConnected,
}

impl ProbeError {
    pub fn validation(field: &'static str) -> Self {
        ProbeError::Validation { field }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        ProbeError::Transport(msg.into())
    }
}

/// Attempt to pull a human-readable `message` field out of an error response
/// body. Falls back to `"unknown"` when the body is absent, unparseable, or
/// carries no such field.
pub fn error_body_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
