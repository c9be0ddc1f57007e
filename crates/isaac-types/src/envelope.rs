//! The uniform result shape returned by every dispatch path.
//!
//! Local execution, pipelines, remote delivery, and queued delivery all
//! produce a [`ResultEnvelope`], so callers never special-case the source.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known metadata keys.
pub mod meta {
    pub const COMMAND: &str = "command";
    pub const TIER: &str = "tier";
    pub const DURATION_MS: &str = "duration_ms";
    pub const EXIT_CODE: &str = "exit_code";
    pub const TRUNCATED: &str = "truncated";
    pub const TIMED_OUT: &str = "timed_out";
    pub const STDERR: &str = "stderr";
    pub const ABORTED: &str = "aborted";
    pub const EXECUTED: &str = "executed";
    pub const CORRECTED_FROM: &str = "corrected_from";
    pub const FORCED: &str = "forced";
    pub const QUEUED: &str = "queued";
    pub const QUEUE_ID: &str = "queue_id";
    pub const TARGET: &str = "target";
    pub const STAGES: &str = "stages";
    /// Zero-based pipeline stage an error came from.
    pub const STAGE: &str = "stage";
    pub const SIGNAL: &str = "signal";
    /// Why a remote delivery was deferred.
    pub const REASON: &str = "reason";
}

/// Stable machine-readable failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    ValidationError,
    PipeNotAccepted,
    TierRejected,
    ExecutionTimeout,
    ExecutionFailed,
    NotAllowlisted,
    DeliveryUnavailable,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::PipeNotAccepted => "PIPE_NOT_ACCEPTED",
            ErrorCode::TierRejected => "TIER_REJECTED",
            ErrorCode::ExecutionTimeout => "EXECUTION_TIMEOUT",
            ErrorCode::ExecutionFailed => "EXECUTION_FAILED",
            ErrorCode::NotAllowlisted => "NOT_ALLOWLISTED",
            ErrorCode::DeliveryUnavailable => "DELIVERY_UNAVAILABLE",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output payload of a dispatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum Output {
    #[default]
    Empty,
    Text(String),
    Json(Value),
}

impl Output {
    /// Render the payload as text, e.g. to feed the next pipeline stage.
    pub fn to_text(&self) -> String {
        match self {
            Output::Empty => String::new(),
            Output::Text(text) => text.clone(),
            Output::Json(value) => value.to_string(),
        }
    }
}

/// Error details attached to a failed envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Result of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// Dispatch-level success. A command that ran under its limits and
    /// exited non-zero is still `ok`; see the `exit_code` metadata.
    pub ok: bool,
    #[serde(default)]
    pub output: Output,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl ResultEnvelope {
    pub fn success(output: Output) -> Self {
        Self {
            ok: true,
            output,
            error: None,
            meta: Map::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::success(Output::Text(text.into()))
    }

    pub fn failure(code: ErrorCode, message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            ok: false,
            output: Output::Empty,
            error: Some(EnvelopeError {
                code,
                message: message.into(),
                hint,
            }),
            meta: Map::new(),
        }
    }

    /// Attach a metadata entry, builder style.
    #[must_use]
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    pub fn set_meta(&mut self, key: &str, value: impl Into<Value>) {
        self.meta.insert(key.to_string(), value.into());
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }

    pub fn meta_bool(&self, key: &str) -> bool {
        self.meta.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn meta_i64(&self, key: &str) -> Option<i64> {
        self.meta.get(key).and_then(Value::as_i64)
    }

    pub fn is_truncated(&self) -> bool {
        self.meta_bool(meta::TRUNCATED)
    }

    /// Queue id for a command that was deferred to the durable queue.
    pub fn queue_id(&self) -> Option<i64> {
        self.meta_i64(meta::QUEUE_ID)
    }
}
