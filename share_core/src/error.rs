//! Error taxonomy shared by the registries, the relay and the transport layer.

use thiserror::Error;

/// Failures local to one request or realtime event. None of them is fatal to
/// the process; each is reported back to whoever initiated the operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// Unknown or expired code, or unknown peer/connection.
    #[error("not found: {0}")]
    NotFound(String),

    /// The relay target has no live connection.
    #[error("target offline: {0}")]
    TargetOffline(String),

    /// Required field missing or unparsable; rejected at the boundary.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("no unused code could be generated")]
    CodeSpaceExhausted,
}

impl SignalError {
    /// Stable identifier sent to clients alongside the human readable message.
    pub fn kind(&self) -> &'static str {
        match self {
            SignalError::NotFound(_) => "not_found",
            SignalError::TargetOffline(_) => "target_offline",
            SignalError::MalformedRequest(_) => "malformed_request",
            SignalError::CodeSpaceExhausted => "code_space_exhausted",
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        SignalError::NotFound(what.into())
    }

    pub fn offline(what: impl Into<String>) -> Self {
        SignalError::TargetOffline(what.into())
    }

    pub fn malformed(what: impl Into<String>) -> Self {
        SignalError::MalformedRequest(what.into())
    }
}

pub type SignalResult<T> = Result<T, SignalError>;
