//! Extraction candidates - field values found in the source content.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A field of the structured job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobField {
    Title,
    Company,
    Location,
    Salary,
    PostedAt,
    RequisitionId,
    Description,
}

impl JobField {
    /// Every field, in record order.
    pub const ALL: [JobField; 7] = [
        JobField::Title,
        JobField::Company,
        JobField::Location,
        JobField::Salary,
        JobField::PostedAt,
        JobField::RequisitionId,
        JobField::Description,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Company => "company",
            Self::Location => "location",
            Self::Salary => "salary",
            Self::PostedAt => "posted_at",
            Self::RequisitionId => "requisition_id",
            Self::Description => "description",
        }
    }

    /// Parse a field name as used on the wire and in env config.
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == normalized || (normalized == "postedat" && *f == Self::PostedAt))
    }
}

impl fmt::Display for JobField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a candidate value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Deterministic extraction rule.
    Rule,
    /// The inference engine.
    Inference,
    /// Supplied by the caller.
    Manual,
}

/// One candidate value for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionCandidate {
    pub field: JobField,
    pub value: String,
    pub source: CandidateSource,
    /// Confidence in this value (0.0 to 1.0).
    pub confidence: f32,
    /// Name of the rule that produced the value, for rule candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

impl ExtractionCandidate {
    /// Candidate from a deterministic rule.
    pub fn rule(field: JobField, value: impl Into<String>, confidence: f32, rule: &'static str) -> Self {
        Self {
            field,
            value: value.into(),
            source: CandidateSource::Rule,
            confidence: confidence.clamp(0.0, 1.0),
            rule: Some(rule.to_string()),
        }
    }

    /// Candidate proposed by the inference engine.
    pub fn inference(field: JobField, value: impl Into<String>, confidence: f32) -> Self {
        Self {
            field,
            value: value.into(),
            source: CandidateSource::Inference,
            confidence: confidence.clamp(0.0, 1.0),
            rule: None,
        }
    }

    /// Candidate supplied by the caller.
    pub fn manual(field: JobField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            source: CandidateSource::Manual,
            confidence: 1.0,
            rule: None,
        }
    }

    /// Whether `self` should replace `incumbent` for the same field.
    ///
    /// Higher confidence wins; ties keep rule-derived values.
    pub fn beats(&self, incumbent: &ExtractionCandidate) -> bool {
        if self.confidence > incumbent.confidence {
            return true;
        }
        self.confidence == incumbent.confidence
            && self.source == CandidateSource::Rule
            && incumbent.source != CandidateSource::Rule
    }
}

/// Output of the structural extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// The winning candidate per recognized field.
    pub selected: BTreeMap<JobField, ExtractionCandidate>,

    /// Candidates that lost to a selected one. Kept for consistency scoring.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<ExtractionCandidate>,

    /// Fields passed to the engine as hints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hinted: Vec<JobField>,

    /// Engine candidates discarded because their value is not in the source.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ungrounded: Vec<JobField>,

    /// Fields the source states as placeholders ("N/A", "TBD"). Never selected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub declared_absent: Vec<JobField>,

    /// Whether the engine was consulted.
    pub engine_consulted: bool,

    /// Whether the engine failed and rule-only results were used.
    pub degraded: bool,
}

impl ExtractionReport {
    /// Offer a candidate; keeps the better one and records the loser.
    pub fn offer(&mut self, candidate: ExtractionCandidate) {
        match self.selected.get(&candidate.field) {
            Some(incumbent) if !candidate.beats(incumbent) => self.alternatives.push(candidate),
            _ => {
                if let Some(previous) = self.selected.insert(candidate.field, candidate) {
                    self.alternatives.push(previous);
                }
            }
        }
    }

    /// Record that the source gave only a placeholder for `field`.
    pub fn declare_absent(&mut self, field: JobField) {
        if !self.declared_absent.contains(&field) {
            self.declared_absent.push(field);
        }
    }

    pub fn get(&self, field: JobField) -> Option<&ExtractionCandidate> {
        self.selected.get(&field)
    }

    pub fn value(&self, field: JobField) -> Option<&str> {
        self.selected.get(&field).map(|c| c.value.as_str())
    }

    /// All candidates, selected first.
    pub fn all_candidates(&self) -> impl Iterator<Item = &ExtractionCandidate> {
        self.selected.values().chain(self.alternatives.iter())
    }

    /// Field → value map of the selected candidates.
    pub fn field_values(&self) -> BTreeMap<JobField, String> {
        self.selected
            .iter()
            .map(|(field, c)| (*field, c.value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_parse() {
        assert_eq!(JobField::parse("posted_at"), Some(JobField::PostedAt));
        assert_eq!(JobField::parse("postedAt"), Some(JobField::PostedAt));
        assert_eq!(JobField::parse("Requisition-Id"), Some(JobField::RequisitionId));
        assert_eq!(JobField::parse("salary "), Some(JobField::Salary));
        assert_eq!(JobField::parse("benefits"), None);
    }

    #[test]
    fn test_tie_favors_rule() {
        let rule = ExtractionCandidate::rule(JobField::Title, "Engineer", 0.8, "meta");
        let engine = ExtractionCandidate::inference(JobField::Title, "Senior Engineer", 0.8);
        assert!(!engine.beats(&rule));
        assert!(rule.beats(&engine));
    }

    #[test]
    fn test_offer_keeps_higher_confidence() {
        let mut report = ExtractionReport::default();
        report.offer(ExtractionCandidate::rule(JobField::Company, "Acme", 0.6, "label"));
        report.offer(ExtractionCandidate::inference(JobField::Company, "Acme Corp", 0.9));
        report.offer(ExtractionCandidate::rule(JobField::Company, "ACME", 0.5, "title"));

        assert_eq!(report.value(JobField::Company), Some("Acme Corp"));
        assert_eq!(report.alternatives.len(), 2);
        assert_eq!(report.all_candidates().count(), 3);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let c = ExtractionCandidate::inference(JobField::Salary, "$100k", 1.7);
        assert_eq!(c.confidence, 1.0);
    }
}
