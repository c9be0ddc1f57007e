//! Error types shared across all isaac crates.

use crate::envelope::{meta, ErrorCode, ResultEnvelope};

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum IsaacError {
    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Storage failure in the durable queue.
///
/// This is the one error a dispatch is allowed to return instead of folding
/// it into an envelope: the command could not be persisted and would
/// otherwise be lost.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue persistence error: {0}")]
    Storage(String),

    #[error("queue lock poisoned")]
    Poisoned,
}

/// Recoverable failures on the dispatch path.
///
/// Every variant becomes a failed [`ResultEnvelope`] with a stable code and
/// a human hint via [`DispatchError::into_envelope`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown command: {input}")]
    NotFound {
        input: String,
        suggestion: Option<String>,
    },

    #[error("invalid argument '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("command '{command}' does not accept piped input")]
    PipeNotAccepted { command: String },

    #[error("command '{command}' was not run: {reason}")]
    TierRejected { command: String, reason: String },

    #[error("command '{command}' timed out after {timeout_ms}ms")]
    ExecutionTimeout { command: String, timeout_ms: u64 },

    #[error("command '{command}' failed: {reason}")]
    ExecutionFailed { command: String, reason: String },

    #[error("executable '{program}' is not on the allowlist")]
    NotAllowlisted { program: String },

    #[error("target '{target}' is unreachable: {reason}")]
    DeliveryUnavailable { target: String, reason: String },
}

impl DispatchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DispatchError::NotFound { .. } => ErrorCode::NotFound,
            DispatchError::Validation { .. } => ErrorCode::ValidationError,
            DispatchError::PipeNotAccepted { .. } => ErrorCode::PipeNotAccepted,
            DispatchError::TierRejected { .. } => ErrorCode::TierRejected,
            DispatchError::ExecutionTimeout { .. } => ErrorCode::ExecutionTimeout,
            DispatchError::ExecutionFailed { .. } => ErrorCode::ExecutionFailed,
            DispatchError::NotAllowlisted { .. } => ErrorCode::NotAllowlisted,
            DispatchError::DeliveryUnavailable { .. } => ErrorCode::DeliveryUnavailable,
        }
    }

    /// Remediation hint shown under the error message.
    pub fn hint(&self) -> Option<String> {
        match self {
            DispatchError::NotFound {
                suggestion: Some(s),
                ..
            } => Some(format!("did you mean '{s}'?")),
            DispatchError::NotFound { .. } => {
                Some("run 'isaac commands list' to see available commands".into())
            }
            DispatchError::Validation { field, .. } => {
                Some(format!("check the value given for '{field}'"))
            }
            DispatchError::PipeNotAccepted { command } => Some(format!(
                "'{command}' must declare stdin = true in its manifest to be piped into"
            )),
            DispatchError::TierRejected { .. } => None,
            DispatchError::ExecutionTimeout { .. } => {
                Some("raise resources.timeout_ms in the command manifest".into())
            }
            DispatchError::ExecutionFailed { .. } => None,
            DispatchError::NotAllowlisted { .. } => {
                Some("add the executable to execution.extra_allowlist".into())
            }
            DispatchError::DeliveryUnavailable { .. } => {
                Some("the command will be retried when the target is reachable".into())
            }
        }
    }

    pub fn into_envelope(self) -> ResultEnvelope {
        let code = self.code();
        let hint = self.hint();
        let mut envelope = ResultEnvelope::failure(code, self.to_string(), hint);
        match self {
            DispatchError::TierRejected { command, .. } => {
                envelope.set_meta(meta::ABORTED, true);
                envelope.set_meta(meta::EXECUTED, false);
                envelope.set_meta(meta::COMMAND, command);
            }
            DispatchError::PipeNotAccepted { .. } => {
                envelope.set_meta(meta::EXECUTED, false);
            }
            DispatchError::ExecutionTimeout { .. } => {
                envelope.set_meta(meta::TIMED_OUT, true);
            }
            _ => {}
        }
        envelope
    }
}

impl From<DispatchError> for ResultEnvelope {
    fn from(err: DispatchError) -> Self {
        err.into_envelope()
    }
}
