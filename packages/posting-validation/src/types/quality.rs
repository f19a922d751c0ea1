//! Quality assessment types produced by the quality gate.

use serde::{Deserialize, Serialize};

use crate::types::candidate::JobField;

/// How serious an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// What kind of problem the gate found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A value matches the forbidden placeholder list.
    PlaceholderValue,
    /// A required field is absent.
    MissingRequiredField,
    /// Title shorter than the minimum.
    TitleTooShort,
    /// Description shorter than the minimum character count.
    DescriptionTooShort,
    /// Description has fewer words than the minimum.
    DescriptionTooFewWords,
    /// Rule- and engine-derived values disagree.
    SourceDisagreement,
    /// A selected value has low confidence.
    LowFieldConfidence,
    /// Classification confidence is below the confident band.
    WeakClassification,
    /// The engine failed and results are rule-only.
    DegradedInference,
    /// Engine values were discarded because they do not appear in the source.
    UngroundedInference,
}

impl IssueKind {
    /// Whether this issue comes from a minimum-length check.
    pub fn is_length_check(&self) -> bool {
        matches!(
            self,
            Self::TitleTooShort | Self::DescriptionTooShort | Self::DescriptionTooFewWords
        )
    }
}

/// A single quality issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<JobField>,
}

impl Issue {
    pub fn new(severity: Severity, kind: IssueKind) -> Self {
        Self {
            severity,
            kind,
            field: None,
        }
    }

    pub fn for_field(severity: Severity, kind: IssueKind, field: JobField) -> Self {
        Self {
            severity,
            kind,
            field: Some(field),
        }
    }
}

/// Deterministic quality assessment of one run's candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// Fraction of required fields present.
    pub completeness: f32,
    /// Fraction of authenticity checks passed.
    pub authenticity: f32,
    /// Agreement between rule- and engine-derived values.
    pub consistency: f32,
    /// Weighted combination of the three (0.0 to 1.0).
    pub overall_score: f32,
    /// Issues in detection order.
    pub issues: Vec<Issue>,
}

impl QualityAssessment {
    /// Assessment for runs that ended before the gate.
    pub fn not_assessed() -> Self {
        Self {
            completeness: 0.0,
            authenticity: 0.0,
            consistency: 0.0,
            overall_score: 0.0,
            issues: Vec::new(),
        }
    }

    pub fn has_critical(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Critical)
    }

    pub fn has_issue(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }

    /// Issues of at least the given severity.
    pub fn issues_at_least(&self, severity: Severity) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.severity >= severity)
    }
}
