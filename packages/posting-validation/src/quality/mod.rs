//! Quality gate.
//!
//! The last point where a result can be refused before it is surfaced.
//! Scores completeness, authenticity and rule/engine consistency, then
//! decides accept, warn or reject.

pub mod placeholders;

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::text;
use crate::types::candidate::{CandidateSource, ExtractionCandidate, ExtractionReport, JobField};
use crate::types::classification::ClassificationResult;
use crate::types::config::QualityConfig;
use crate::types::outcome::{QualityRejection, RejectionReason, ValidationOutcome};
use crate::types::quality::{Issue, IssueKind, QualityAssessment, Severity};

pub use placeholders::PlaceholderDetector;

/// What the gate decided.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept,
    Warn,
    Reject(RejectionReason),
}

/// Assessment plus verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct GateDecision {
    pub assessment: QualityAssessment,
    pub verdict: Verdict,
}

impl GateDecision {
    pub fn is_reject(&self) -> bool {
        matches!(self.verdict, Verdict::Reject(_))
    }

    /// Turn the decision into an outcome carrying `fields`.
    ///
    /// Rejections drop the fields.
    pub fn into_outcome(self, fields: BTreeMap<JobField, String>) -> ValidationOutcome {
        match self.verdict {
            Verdict::Accept => ValidationOutcome::accepted(fields, self.assessment),
            Verdict::Warn => ValidationOutcome::warned(fields, self.assessment),
            Verdict::Reject(reason) => ValidationOutcome::rejected(reason, self.assessment),
        }
    }
}

/// Deterministic quality gate.
#[derive(Debug, Clone)]
pub struct QualityGate {
    config: QualityConfig,
    placeholders: PlaceholderDetector,
    /// Classification confidence below this caps the verdict at warn.
    confident_classification: f32,
}

impl QualityGate {
    pub fn new(config: QualityConfig, confident_classification: f32) -> Self {
        let placeholders = PlaceholderDetector::new(&config.extra_forbidden_values);
        Self {
            config,
            placeholders,
            confident_classification,
        }
    }

    pub fn placeholders(&self) -> &PlaceholderDetector {
        &self.placeholders
    }

    /// Score the extraction report.
    pub fn assess(
        &self,
        report: &ExtractionReport,
        classification: Option<&ClassificationResult>,
    ) -> QualityAssessment {
        let cfg = &self.config;
        let mut issues = Vec::new();

        // Completeness
        let missing: Vec<JobField> = cfg
            .required_fields
            .iter()
            .copied()
            .filter(|f| report.get(*f).is_none())
            .collect();
        for field in &missing {
            issues.push(Issue::for_field(Severity::High, IssueKind::MissingRequiredField, *field));
        }
        let required = cfg.required_fields.len().max(1) as f32;
        let completeness = (cfg.required_fields.len() - missing.len()) as f32 / required;

        // Authenticity
        let mut placeholder = false;
        for (field, candidate) in &report.selected {
            if self.placeholders.is_forbidden(&candidate.value) {
                placeholder = true;
                issues.push(Issue::for_field(Severity::Critical, IssueKind::PlaceholderValue, *field));
            }
        }
        // A required field the source only filled with a placeholder.
        for field in &report.declared_absent {
            if cfg.required_fields.contains(field) && report.get(*field).is_none() {
                placeholder = true;
                issues.push(Issue::for_field(Severity::Critical, IssueKind::PlaceholderValue, *field));
            }
        }
        let mut length_checks = Vec::new();
        if let Some(title) = report.value(JobField::Title) {
            length_checks.push((
                title.trim().chars().count() >= cfg.min_title_chars,
                Issue::for_field(Severity::High, IssueKind::TitleTooShort, JobField::Title),
            ));
        }
        if let Some(description) = report.value(JobField::Description) {
            length_checks.push((
                description.trim().chars().count() >= cfg.min_description_chars,
                Issue::for_field(Severity::High, IssueKind::DescriptionTooShort, JobField::Description),
            ));
            length_checks.push((
                text::word_count(description) >= cfg.min_description_words,
                Issue::for_field(
                    Severity::Medium,
                    IssueKind::DescriptionTooFewWords,
                    JobField::Description,
                ),
            ));
        }
        let applicable = length_checks.len();
        let mut passed = 0usize;
        for (ok, issue) in length_checks {
            if ok {
                passed += 1;
            } else {
                issues.push(issue);
            }
        }
        let authenticity = if placeholder {
            0.0
        } else if applicable == 0 {
            1.0
        } else {
            passed as f32 / applicable as f32
        };

        // Consistency
        let mut agreements = Vec::new();
        for field in JobField::ALL {
            let Some((rule, engine)) = rule_and_engine(report, field) else {
                continue;
            };
            let agreement = text::token_agreement(&rule.value, &engine.value);
            if agreement < cfg.disagreement_threshold {
                issues.push(Issue::for_field(Severity::Medium, IssueKind::SourceDisagreement, field));
            }
            agreements.push(agreement);
        }
        let consistency = if agreements.is_empty() {
            1.0
        } else {
            agreements.iter().sum::<f32>() / agreements.len() as f32
        };

        // Advisory issues
        for (field, candidate) in &report.selected {
            if candidate.confidence < cfg.low_field_confidence {
                issues.push(Issue::for_field(Severity::Low, IssueKind::LowFieldConfidence, *field));
            }
        }
        for field in &report.ungrounded {
            issues.push(Issue::for_field(Severity::Low, IssueKind::UngroundedInference, *field));
        }
        if report.degraded || classification.is_some_and(|c| c.degraded) {
            issues.push(Issue::new(Severity::Medium, IssueKind::DegradedInference));
        }
        if classification.is_some_and(|c| c.confidence < self.confident_classification) {
            issues.push(Issue::new(Severity::Medium, IssueKind::WeakClassification));
        }

        let overall_score = (cfg.completeness_weight * completeness
            + cfg.authenticity_weight * authenticity
            + cfg.consistency_weight * consistency)
            .clamp(0.0, 1.0);

        debug!(
            completeness,
            authenticity,
            consistency,
            overall_score,
            issues = issues.len(),
            "Quality assessed"
        );

        QualityAssessment {
            completeness,
            authenticity,
            consistency,
            overall_score,
            issues,
        }
    }

    /// Assess and decide.
    pub fn evaluate(
        &self,
        report: &ExtractionReport,
        classification: Option<&ClassificationResult>,
    ) -> GateDecision {
        let assessment = self.assess(report, classification);
        let verdict = self.decide(&assessment);
        info!(
            overall_score = assessment.overall_score,
            verdict = ?verdict,
            "Quality gate decided"
        );
        GateDecision {
            assessment,
            verdict,
        }
    }

    /// Run the gate alone over a field map, as manual candidates.
    pub fn evaluate_fields(&self, fields: &BTreeMap<JobField, String>) -> GateDecision {
        let mut report = ExtractionReport::default();
        for (field, value) in fields {
            report.offer(ExtractionCandidate::manual(*field, value.clone()));
        }
        self.evaluate(&report, None)
    }

    fn decide(&self, assessment: &QualityAssessment) -> Verdict {
        let cfg = &self.config;

        if assessment.has_issue(IssueKind::PlaceholderValue) {
            return Verdict::Reject(RejectionReason::QualityGateRejected {
                cause: QualityRejection::PlaceholderDetected,
            });
        }

        let missing: Vec<JobField> = assessment
            .issues
            .iter()
            .filter(|i| i.kind == IssueKind::MissingRequiredField)
            .filter_map(|i| i.field)
            .collect();
        if !missing.is_empty() {
            return Verdict::Reject(RejectionReason::ExtractionIncomplete { missing });
        }

        if assessment.overall_score < cfg.reject_threshold {
            let cause = if assessment.issues.iter().any(|i| i.kind.is_length_check()) {
                QualityRejection::InsufficientContent
            } else {
                QualityRejection::LowOverallScore
            };
            return Verdict::Reject(RejectionReason::QualityGateRejected { cause });
        }

        if assessment.overall_score < cfg.warn_threshold
            || assessment.has_issue(IssueKind::DegradedInference)
            || assessment.has_issue(IssueKind::WeakClassification)
        {
            return Verdict::Warn;
        }

        Verdict::Accept
    }
}

/// Best rule-derived and best engine-derived candidate for a field.
fn rule_and_engine(
    report: &ExtractionReport,
    field: JobField,
) -> Option<(&ExtractionCandidate, &ExtractionCandidate)> {
    let best = |source: CandidateSource| {
        report
            .all_candidates()
            .filter(|c| c.field == field && c.source == source)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    };
    Some((best(CandidateSource::Rule)?, best(CandidateSource::Inference)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::outcome::OutcomeStatus;

    const DESCRIPTION: &str = "You will design, build and operate the payment services that \
        thousands of merchants rely on every day, working closely with product and \
        infrastructure teams to ship reliable features.";

    fn gate() -> QualityGate {
        QualityGate::new(QualityConfig::default(), 0.7)
    }

    fn good_fields() -> BTreeMap<JobField, String> {
        BTreeMap::from([
            (JobField::Title, "Senior Backend Engineer".to_string()),
            (JobField::Company, "Acme Corp".to_string()),
            (JobField::Description, DESCRIPTION.to_string()),
        ])
    }

    #[test]
    fn test_complete_fields_are_accepted() {
        let decision = gate().evaluate_fields(&good_fields());
        assert_eq!(decision.verdict, Verdict::Accept);
        assert_eq!(decision.assessment.overall_score, 1.0);
    }

    #[test]
    fn test_placeholder_rejected_despite_high_scores() {
        let mut fields = good_fields();
        fields.insert(JobField::Title, "Unknown Position".to_string());
        fields.insert(JobField::Company, "Unknown Company".to_string());

        let decision = gate().evaluate_fields(&fields);
        assert_eq!(decision.assessment.completeness, 1.0);
        assert_eq!(
            decision.verdict,
            Verdict::Reject(RejectionReason::QualityGateRejected {
                cause: QualityRejection::PlaceholderDetected
            })
        );
        let outcome = decision.into_outcome(fields);
        assert_eq!(outcome.status, OutcomeStatus::Rejected);
        assert!(outcome.fields.is_none());
    }

    #[test]
    fn test_missing_required_field() {
        let mut fields = good_fields();
        fields.remove(&JobField::Company);
        let decision = gate().evaluate_fields(&fields);
        assert_eq!(
            decision.verdict,
            Verdict::Reject(RejectionReason::ExtractionIncomplete {
                missing: vec![JobField::Company]
            })
        );
    }

    #[test]
    fn test_short_fields_are_insufficient_content() {
        let mut fields = good_fields();
        fields.insert(JobField::Description, "Great job.".to_string());
        fields.insert(JobField::Title, "Dev".to_string());
        let decision = gate().evaluate_fields(&fields);
        // 0.3 + 0.4 * 0 + 0.3
        assert!((decision.assessment.overall_score - 0.6).abs() < 1e-6);
        assert!(decision.assessment.has_issue(IssueKind::DescriptionTooShort));
        assert!(decision.assessment.has_issue(IssueKind::TitleTooShort));
        assert_eq!(
            decision.verdict,
            Verdict::Reject(RejectionReason::QualityGateRejected {
                cause: QualityRejection::InsufficientContent
            })
        );
    }

    #[test]
    fn test_short_description_warns() {
        let mut fields = good_fields();
        fields.insert(JobField::Description, "Great job.".to_string());
        let decision = gate().evaluate_fields(&fields);
        // 0.3 + 0.4 / 3 + 0.3
        assert!((decision.assessment.overall_score - 0.7333).abs() < 1e-3);
        assert_eq!(decision.verdict, Verdict::Warn);
    }

    #[test]
    fn test_disagreement_lowers_consistency() {
        let mut report = ExtractionReport::default();
        for (field, value) in good_fields() {
            report.offer(ExtractionCandidate::rule(field, value, 0.75, "labelled_line"));
        }
        report.offer(ExtractionCandidate::inference(JobField::Company, "Globex Inc", 0.9));

        let assessment = gate().assess(&report, None);
        assert_eq!(assessment.consistency, 0.0);
        assert!(assessment.has_issue(IssueKind::SourceDisagreement));
        // 0.3 + 0.4 + 0.0
        assert!((assessment.overall_score - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_degraded_caps_at_warn() {
        let mut report = ExtractionReport::default();
        for (field, value) in good_fields() {
            report.offer(ExtractionCandidate::rule(field, value, 0.8, "json_ld"));
        }
        report.degraded = true;
        let decision = gate().evaluate(&report, None);
        assert_eq!(decision.assessment.overall_score, 1.0);
        assert_eq!(decision.verdict, Verdict::Warn);
    }

    fn report_of(fields: BTreeMap<JobField, String>) -> ExtractionReport {
        let mut report = ExtractionReport::default();
        for (field, value) in fields {
            report.offer(ExtractionCandidate::rule(field, value, 0.9, "json_ld"));
        }
        report
    }

    #[test]
    fn test_declared_absent_optional_field_is_harmless() {
        let mut report = report_of(good_fields());
        report.declare_absent(JobField::Salary);
        let decision = gate().evaluate(&report, None);
        assert_eq!(decision.verdict, Verdict::Accept);
        assert!(!decision.assessment.has_issue(IssueKind::PlaceholderValue));
    }

    #[test]
    fn test_declared_absent_required_field_is_a_placeholder() {
        let mut fields = good_fields();
        fields.remove(&JobField::Company);
        let mut report = report_of(fields);
        report.declare_absent(JobField::Company);

        let decision = gate().evaluate(&report, None);
        assert_eq!(decision.assessment.authenticity, 0.0);
        assert_eq!(
            decision.verdict,
            Verdict::Reject(RejectionReason::QualityGateRejected {
                cause: QualityRejection::PlaceholderDetected
            })
        );
    }

    #[test]
    fn test_accepted_fields_reassess_as_accepted() {
        let decision = gate().evaluate_fields(&good_fields());
        let outcome = decision.into_outcome(good_fields());
        let again = gate().evaluate_fields(outcome.fields.as_ref().unwrap());
        assert_eq!(again.verdict, Verdict::Accept);
    }
}
