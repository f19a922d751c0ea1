//! The terminal artifact of a pipeline run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::candidate::JobField;
use crate::types::quality::QualityAssessment;

/// Final decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Accepted,
    /// Accepted with issues attached for caller-side review.
    Warned,
    Rejected,
}

/// Why classification stopped the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationRejection {
    NonJob,
    Expired,
    LoginRequired,
    AmbiguousUnresolved,
}

/// Why the quality gate rejected the candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityRejection {
    PlaceholderDetected,
    InsufficientContent,
    LowOverallScore,
}

/// Machine-readable reason a run did not succeed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    /// The fetch collaborator reports the URL as inaccessible.
    AccessibilityFailure { detail: String },

    /// Classification did not reach a job posting.
    ClassificationRejected { cause: ClassificationRejection },

    /// Required fields are unresolved after rule and engine attempts.
    ExtractionIncomplete { missing: Vec<JobField> },

    /// The quality gate refused the candidates.
    QualityGateRejected { cause: QualityRejection },

    /// The engine failed and rule-only results could not pass the gate.
    EngineFailure { detail: String },

    /// The caller cancelled the run.
    Cancelled,

    /// Unexpected internal failure.
    SystemError { detail: String },
}

impl RejectionReason {
    /// Stable code for logs and the persistence collaborator.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AccessibilityFailure { .. } => "ACCESSIBILITY_FAILURE",
            Self::ClassificationRejected { .. } => "CLASSIFICATION_REJECTED",
            Self::ExtractionIncomplete { .. } => "EXTRACTION_INCOMPLETE",
            Self::QualityGateRejected { .. } => "QUALITY_GATE_REJECTED",
            Self::EngineFailure { .. } => "ENGINE_FAILURE",
            Self::Cancelled => "CANCELLED",
            Self::SystemError { .. } => "SYSTEM_ERROR",
        }
    }

    /// Whether the same input may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AccessibilityFailure { .. } | Self::EngineFailure { .. } | Self::Cancelled
        )
    }

    /// Human-readable explanation.
    pub fn explanation(&self) -> String {
        match self {
            Self::AccessibilityFailure { detail } => {
                format!("The posting could not be accessed ({detail}).")
            }
            Self::ClassificationRejected { cause } => match cause {
                ClassificationRejection::NonJob => {
                    "The page is not a job posting.".to_string()
                }
                ClassificationRejection::Expired => {
                    "The posting has expired or is no longer accepting applications.".to_string()
                }
                ClassificationRejection::LoginRequired => {
                    "The posting is behind a login wall.".to_string()
                }
                ClassificationRejection::AmbiguousUnresolved => {
                    "The page could not be confidently identified as a job posting.".to_string()
                }
            },
            Self::ExtractionIncomplete { missing } => {
                let names: Vec<&str> = missing.iter().map(|f| f.as_str()).collect();
                format!("Required fields could not be found: {}.", names.join(", "))
            }
            Self::QualityGateRejected { cause } => match cause {
                QualityRejection::PlaceholderDetected => {
                    "Placeholder values were found instead of real posting data.".to_string()
                }
                QualityRejection::InsufficientContent => {
                    "The posting does not contain enough content to validate.".to_string()
                }
                QualityRejection::LowOverallScore => {
                    "The extracted data did not reach the required quality score.".to_string()
                }
            },
            Self::EngineFailure { detail } => {
                format!("Validation could not be completed without the inference engine ({detail}).")
            }
            Self::Cancelled => "Validation was cancelled before it completed.".to_string(),
            Self::SystemError { detail } => format!("Internal error during validation ({detail})."),
        }
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub status: OutcomeStatus,

    /// Extracted fields; present only when accepted or warned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<JobField, String>>,

    pub quality: QualityAssessment,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<RejectionReason>,

    /// Engine failure the run fell back from; set on warned results only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absorbed_failure: Option<RejectionReason>,

    /// Whether the same input may do better on a later attempt.
    #[serde(default)]
    pub retryable: bool,
}

impl ValidationOutcome {
    pub fn accepted(fields: BTreeMap<JobField, String>, quality: QualityAssessment) -> Self {
        Self {
            status: OutcomeStatus::Accepted,
            fields: Some(fields),
            quality,
            rejection_reason: None,
            absorbed_failure: None,
            retryable: false,
        }
    }

    pub fn warned(fields: BTreeMap<JobField, String>, quality: QualityAssessment) -> Self {
        Self {
            status: OutcomeStatus::Warned,
            fields: Some(fields),
            quality,
            rejection_reason: None,
            absorbed_failure: None,
            retryable: false,
        }
    }

    /// Rejections never carry fields.
    pub fn rejected(reason: RejectionReason, quality: QualityAssessment) -> Self {
        Self {
            status: OutcomeStatus::Rejected,
            fields: None,
            quality,
            retryable: reason.is_retryable(),
            rejection_reason: Some(reason),
            absorbed_failure: None,
        }
    }

    /// Mark a warned result as produced without the engine.
    pub fn with_absorbed_failure(mut self, failure: RejectionReason) -> Self {
        self.retryable = self.retryable || failure.is_retryable();
        self.absorbed_failure = Some(failure);
        self
    }

    pub fn is_accepted(&self) -> bool {
        self.status == OutcomeStatus::Accepted
    }

    pub fn is_rejected(&self) -> bool {
        self.status == OutcomeStatus::Rejected
    }

    pub fn field(&self, field: JobField) -> Option<&str> {
        self.fields
            .as_ref()
            .and_then(|f| f.get(&field))
            .map(|v| v.as_str())
    }

    /// Explanation of the rejection, if any.
    pub fn explanation(&self) -> Option<String> {
        self.rejection_reason.as_ref().map(|r| r.explanation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_has_no_fields() {
        let outcome = ValidationOutcome::rejected(
            RejectionReason::Cancelled,
            QualityAssessment::not_assessed(),
        );
        assert!(outcome.fields.is_none());
        assert!(outcome.is_rejected());
        assert!(outcome.explanation().is_some());
    }

    #[test]
    fn test_absorbed_failure_marks_warned_retryable() {
        let outcome = ValidationOutcome::warned(BTreeMap::new(), QualityAssessment::not_assessed())
            .with_absorbed_failure(RejectionReason::EngineFailure {
                detail: "ENGINE_TIMEOUT".into(),
            });
        assert!(outcome.retryable);
        assert!(outcome.rejection_reason.is_none());

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["absorbed_failure"]["code"], "ENGINE_FAILURE");
        assert_eq!(json["retryable"], true);
    }

    #[test]
    fn test_retryable_reasons() {
        assert!(RejectionReason::AccessibilityFailure {
            detail: "HTTP 503".into()
        }
        .is_retryable());
        assert!(!RejectionReason::QualityGateRejected {
            cause: QualityRejection::PlaceholderDetected
        }
        .is_retryable());
        assert!(!RejectionReason::ClassificationRejected {
            cause: ClassificationRejection::Expired
        }
        .is_retryable());
    }

    #[test]
    fn test_reason_serializes_with_code_tag() {
        let reason = RejectionReason::ClassificationRejected {
            cause: ClassificationRejection::NonJob,
        };
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["code"], "CLASSIFICATION_REJECTED");
        assert_eq!(json["cause"], "non_job");
        assert_eq!(reason.code(), "CLASSIFICATION_REJECTED");
    }
}
