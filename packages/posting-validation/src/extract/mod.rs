//! Structural field extraction.
//!
//! Deterministic rules run first. Fields the rules miss, or settle below
//! the rule confidence floor, go to the engine as hints. Engine values are
//! kept only when they are grounded in the source text, and per field the
//! higher confidence wins with ties going to the rule.
//!
//! Placeholder values ("N/A", "Unknown Company") never become candidates.
//! A field the source fills with one is recorded as declared absent. Manual
//! overrides of required fields are the exception: they are kept so the
//! quality gate refuses them.

pub mod rules;
pub mod structured;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::engine::{EngineUsage, InferenceOrchestrator};
use crate::quality::PlaceholderDetector;
use crate::text;
use crate::types::candidate::{CandidateSource, ExtractionCandidate, ExtractionReport, JobField};
use crate::types::classification::Platform;
use crate::types::config::{ExtractorConfig, InferenceStrategy, QualityConfig};
use crate::types::content::{FieldOverrides, RawContent};

/// Extracts job fields from raw content.
pub struct StructuralExtractor {
    config: ExtractorConfig,
    degraded_cap: f32,
    orchestrator: Option<Arc<InferenceOrchestrator>>,
    placeholders: PlaceholderDetector,
    required: Vec<JobField>,
}

impl StructuralExtractor {
    pub fn new(config: ExtractorConfig, degraded_cap: f32) -> Self {
        Self {
            config,
            degraded_cap,
            orchestrator: None,
            placeholders: PlaceholderDetector::default(),
            required: QualityConfig::default().required_fields,
        }
    }

    /// Use the gate's forbidden values and required fields.
    pub fn with_quality(mut self, quality: &QualityConfig) -> Self {
        self.placeholders = PlaceholderDetector::new(&quality.extra_forbidden_values);
        self.required = quality.required_fields.clone();
        self
    }

    /// Ask this orchestrator about fields the rules could not settle.
    pub fn with_orchestrator(mut self, orchestrator: Arc<InferenceOrchestrator>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    fn engine(&self) -> Option<&InferenceOrchestrator> {
        match self.config.strategy {
            InferenceStrategy::Hybrid => self.orchestrator.as_deref(),
            InferenceStrategy::RulesOnly => None,
        }
    }

    /// Fields with no candidate or only a weak one.
    ///
    /// Fields the source declares absent are not asked about.
    pub fn hints(&self, report: &ExtractionReport) -> Vec<JobField> {
        JobField::ALL
            .into_iter()
            .filter(|field| !report.declared_absent.contains(field))
            .filter(|field| {
                report
                    .get(*field)
                    .map_or(true, |c| c.confidence < self.config.rule_confidence_floor)
            })
            .collect()
    }

    /// Offer `candidate` unless its value is a placeholder.
    fn admit(&self, report: &mut ExtractionReport, candidate: ExtractionCandidate) {
        if !self.placeholders.is_forbidden(&candidate.value) {
            report.offer(candidate);
            return;
        }
        match candidate.source {
            CandidateSource::Manual if self.required.contains(&candidate.field) => {
                report.offer(candidate);
            }
            CandidateSource::Inference => {
                debug!(field = %candidate.field, "Dropping placeholder engine value");
            }
            CandidateSource::Rule | CandidateSource::Manual => {
                debug!(field = %candidate.field, value = %candidate.value, "Field declared absent");
                report.declare_absent(candidate.field);
            }
        }
    }

    /// Extract fields from `content`.
    ///
    /// `text` is the visible text of the content; engine values must appear
    /// in it or in the page title. Manual overrides are offered as
    /// candidates with full confidence, so the engine is never asked about
    /// fields the caller supplied.
    pub async fn extract(
        &self,
        content: &RawContent,
        text: &str,
        platform: Platform,
        overrides: Option<&FieldOverrides>,
        usage: &mut EngineUsage,
    ) -> ExtractionReport {
        let mut report = ExtractionReport::default();

        for candidate in rules::all_rules(content, text, platform) {
            self.admit(&mut report, candidate);
        }
        if let Some(overrides) = overrides {
            for (field, value) in &overrides.values {
                self.admit(&mut report, ExtractionCandidate::manual(*field, value.trim()));
            }
        }
        // A real value from another rule outranks a placeholder elsewhere.
        report
            .declared_absent
            .retain(|field| !report.selected.contains_key(field));
        debug!(
            fields = ?report.selected.keys().collect::<Vec<_>>(),
            "Rule extraction complete"
        );

        let hints = self.hints(&report);
        report.hinted = hints.clone();

        if let (false, Some(engine)) = (hints.is_empty(), self.engine()) {
            report.engine_consulted = true;
            match engine.extract(text, &hints, usage).await {
                Ok(proposed) => {
                    let title = text::page_title(&content.body).unwrap_or_default();
                    let source = text::normalize_for_match(&format!("{title}\n{text}"));
                    for candidate in proposed {
                        if self.placeholders.is_forbidden(&candidate.value) {
                            debug!(field = %candidate.field, "Dropping placeholder engine value");
                        } else if text::is_grounded(&candidate.value, &source) {
                            self.admit(&mut report, ExtractionCandidate::inference(
                                candidate.field,
                                candidate.value.trim(),
                                candidate.confidence,
                            ));
                        } else {
                            debug!(field = %candidate.field, "Dropping ungrounded engine value");
                            if !report.ungrounded.contains(&candidate.field) {
                                report.ungrounded.push(candidate.field);
                            }
                        }
                    }
                }
                Err(error) => {
                    warn!(code = error.code(), "Engine extraction failed, using rules only");
                    report.degraded = true;
                    self.cap_rule_confidence(&mut report);
                }
            }
        }

        info!(
            fields = report.selected.len(),
            hinted = report.hinted.len(),
            engine_consulted = report.engine_consulted,
            degraded = report.degraded,
            "Extraction complete"
        );
        report
    }

    /// Apply the degraded ceiling to rule-derived candidates.
    fn cap_rule_confidence(&self, report: &mut ExtractionReport) {
        let cap = self.degraded_cap;
        let candidates = report
            .selected
            .values_mut()
            .chain(report.alternatives.iter_mut());
        for candidate in candidates {
            if candidate.source == CandidateSource::Rule {
                candidate.confidence = candidate.confidence.min(cap);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::testing::MockEngine;
    use crate::text::visible_text;
    use crate::types::config::EngineConfig;

    const PAGE: &str = r#"<html><head><title>Backend Engineer | Acme Corp</title></head><body>
        <h1>Backend Engineer</h1>
        <p>Location: Berlin</p>
        <h2>About the role</h2>
        <p>You will design, build and operate the payment services that thousands of merchants rely on every day.</p>
        <ul><li>Own services end to end</li><li>Work with product on roadmap</li></ul>
        </body></html>"#;

    fn extractor(engine: Option<MockEngine>) -> (Option<Arc<MockEngine>>, StructuralExtractor) {
        let mut extractor = StructuralExtractor::new(ExtractorConfig::default(), 0.8);
        let engine = engine.map(Arc::new);
        if let Some(engine) = &engine {
            let orch = InferenceOrchestrator::new(engine.clone(), EngineConfig::default());
            extractor = extractor.with_orchestrator(Arc::new(orch));
        }
        (engine, extractor)
    }

    async fn run(extractor: &StructuralExtractor, overrides: Option<&FieldOverrides>) -> ExtractionReport {
        let content = RawContent::html("https://acme.com/careers/backend", PAGE);
        let text = visible_text(&content);
        extractor
            .extract(&content, &text, Platform::Company, overrides, &mut EngineUsage::new())
            .await
    }

    #[tokio::test]
    async fn test_rules_only_never_invents() {
        let (_, extractor) = extractor(None);
        let report = run(&extractor, None).await;

        assert_eq!(report.value(JobField::Title), Some("Backend Engineer"));
        assert_eq!(report.value(JobField::Location), Some("Berlin"));
        assert_eq!(report.value(JobField::Company), Some("Acme Corp"));
        assert!(report.get(JobField::Salary).is_none());
        assert!(report
            .value(JobField::Description)
            .unwrap()
            .contains("- Own services end to end"));
        assert!(!report.engine_consulted);
    }

    #[tokio::test]
    async fn test_weak_fields_become_hints() {
        let (_, extractor) = extractor(None);
        let report = run(&extractor, None).await;
        // Company comes from the title split (0.6) and description from the body (0.6).
        assert!(report.hinted.contains(&JobField::Company));
        assert!(report.hinted.contains(&JobField::Description));
        assert!(report.hinted.contains(&JobField::Salary));
        assert!(!report.hinted.contains(&JobField::Location));
    }

    #[tokio::test]
    async fn test_grounded_engine_values_win() {
        let engine = MockEngine::new()
            .with_candidate(JobField::Company, "Acme Corp", 0.9)
            .with_candidate(JobField::Salary, "$150,000", 0.9);
        let (engine, extractor) = extractor(Some(engine));
        let report = run(&extractor, None).await;

        let company = report.get(JobField::Company).unwrap();
        assert_eq!(company.source, CandidateSource::Inference);
        assert_eq!(company.value, "Acme Corp");
        // Not in the page.
        assert!(report.get(JobField::Salary).is_none());
        assert_eq!(report.ungrounded, vec![JobField::Salary]);
        assert_eq!(engine.unwrap().extract_calls(), 1);
    }

    #[tokio::test]
    async fn test_placeholder_from_engine_is_dropped() {
        let engine = MockEngine::new().with_candidate(JobField::Company, "Unknown Company", 0.99);
        let (_, extractor) = extractor(Some(engine));
        let report = run(&extractor, None).await;
        assert_eq!(report.value(JobField::Company), Some("Acme Corp"));
        assert!(report.ungrounded.is_empty());
        assert!(report.declared_absent.is_empty());
    }

    const ABSENT_SALARY_PAGE: &str = r#"<html><head><title>Backend Engineer | Acme Corp</title></head><body>
        <h1>Backend Engineer</h1>
        <p>Location: TBD</p>
        <p>Salary: Not specified</p>
        <p>Job ID: N/A</p>
        <h2>About the role</h2>
        <p>You will design, build and operate the payment services that thousands of merchants rely on every day.</p>
        </body></html>"#;

    #[tokio::test]
    async fn test_absent_values_are_omitted() {
        let (_, extractor) = extractor(None);
        let content = RawContent::html("https://acme.com/careers/backend", ABSENT_SALARY_PAGE);
        let text = visible_text(&content);
        let report = extractor
            .extract(&content, &text, Platform::Company, None, &mut EngineUsage::new())
            .await;

        assert!(report.get(JobField::Location).is_none());
        assert!(report.get(JobField::Salary).is_none());
        assert!(report.get(JobField::RequisitionId).is_none());
        assert!(report.declared_absent.contains(&JobField::Location));
        assert!(report.declared_absent.contains(&JobField::Salary));
        assert!(report.declared_absent.contains(&JobField::RequisitionId));
        assert!(!report.hinted.contains(&JobField::Salary));
        assert_eq!(report.value(JobField::Title), Some("Backend Engineer"));
    }

    #[tokio::test]
    async fn test_placeholder_overrides_of_required_fields_reach_the_gate() {
        let overrides = FieldOverrides::new()
            .with(JobField::Company, "Unknown Company")
            .with(JobField::Salary, "N/A");
        let (_, extractor) = extractor(None);
        let report = run(&extractor, Some(&overrides)).await;

        assert_eq!(report.value(JobField::Company), Some("Unknown Company"));
        assert!(report.get(JobField::Salary).is_none());
        assert_eq!(report.declared_absent, vec![JobField::Salary]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_failure_caps_rules() {
        let engine = MockEngine::new().failing_with(EngineError::unavailable("down"));
        let (_, extractor) = extractor(Some(engine));
        let report = run(&extractor, None).await;

        assert!(report.degraded);
        assert!(report.all_candidates().all(|c| c.confidence <= 0.8));
        assert_eq!(report.value(JobField::Title), Some("Backend Engineer"));
    }

    #[tokio::test]
    async fn test_overrides_are_not_hinted() {
        let overrides = FieldOverrides::new()
            .with(JobField::Company, "Acme Corp")
            .with(JobField::Salary, "$120k");
        let engine = MockEngine::new();
        let (engine, extractor) = extractor(Some(engine));
        let report = run(&extractor, Some(&overrides)).await;

        assert_eq!(report.get(JobField::Company).unwrap().source, CandidateSource::Manual);
        assert_eq!(report.value(JobField::Salary), Some("$120k"));
        assert!(!report.hinted.contains(&JobField::Company));
        match &engine.unwrap().calls()[0] {
            crate::testing::MockEngineCall::Extract { hints, .. } => {
                assert!(!hints.contains(&JobField::Salary));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }
}
