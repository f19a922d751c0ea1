//! Typed errors for the validation library.
//!
//! Uses `thiserror` for library errors (not `anyhow`). Caller-facing
//! rejections are not errors: they travel inside
//! [`ValidationOutcome`](crate::types::outcome::ValidationOutcome) as a
//! [`RejectionReason`](crate::types::outcome::RejectionReason).

use std::time::Duration;

use thiserror::Error;

use crate::types::outcome::RejectionReason;

/// Failure of a call to the inference engine.
///
/// These are the only three ways an engine call can fail. Callers are
/// expected to absorb them by falling back to rule-only behavior.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The engine did not answer within the allotted time.
    #[error("inference engine timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// The engine is unreachable, or the circuit breaker is open.
    #[error("inference engine unavailable: {reason}")]
    Unavailable { reason: String },

    /// The engine answered, but below the configured confidence floor.
    #[error("inference engine confidence {confidence:.2} below floor {floor:.2}")]
    LowConfidence { confidence: f32, floor: f32 },
}

impl EngineError {
    /// Create an `Unavailable` error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Machine-readable code for audit records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "ENGINE_TIMEOUT",
            Self::Unavailable { .. } => "ENGINE_UNAVAILABLE",
            Self::LowConfidence { .. } => "ENGINE_LOW_CONFIDENCE",
        }
    }

    /// Only timeouts are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether this failure counts against the circuit breaker.
    ///
    /// A low-confidence answer still proves the engine is reachable.
    pub fn trips_breaker(&self) -> bool {
        !matches!(self, Self::LowConfidence { .. })
    }
}

/// Invalid pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value lies outside its allowed range.
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Two related thresholds are in the wrong order.
    #[error("{lower} ({lower_value}) must not exceed {upper} ({upper_value})")]
    Ordering {
        lower: &'static str,
        lower_value: f64,
        upper: &'static str,
        upper_value: f64,
    },

    /// Score weights do not sum to one.
    #[error("quality weights must sum to 1.0, got {sum:.3}")]
    WeightSum { sum: f64 },

    /// A required list is empty.
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    /// An environment variable could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: String, value: String },

    /// The HTTP client for the inference engine could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Unrecoverable pipeline failure.
///
/// Never returned to the caller of `run()`; the pipeline converts it into a
/// `FAILED` terminal state with a structured rejection reason.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage panicked.
    #[error("stage {stage} panicked: {message}")]
    Panicked { stage: &'static str, message: String },

    /// Cancellation was requested between stages.
    #[error("run cancelled during {stage}")]
    Cancelled { stage: &'static str },

    /// The state machine refused a transition.
    #[error("no transition from {from} on {report}")]
    InvalidTransition { from: &'static str, report: String },
}

impl PipelineError {
    /// The rejection reason a failed run reports.
    pub fn rejection_reason(&self) -> RejectionReason {
        match self {
            Self::Cancelled { .. } => RejectionReason::Cancelled,
            other => RejectionReason::SystemError {
                detail: other.to_string(),
            },
        }
    }
}

/// Errors raised by a run sink (the persistence collaborator).
#[derive(Debug, Error)]
pub enum SinkError {
    /// Serialization of the run artifacts failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The underlying store rejected the write.
    #[error("sink storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type alias for engine calls.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Result type alias for configuration handling.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
