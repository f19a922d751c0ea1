//! Validation pipeline.
//!
//! Drives one piece of content through
//! `INIT → URL_CHECK → CLASSIFY → EXTRACT → QUALITY_GATE` and into exactly
//! one terminal state. Every run yields a [`ValidationOutcome`] and an
//! [`AuditRecord`], including runs that were cancelled or panicked.
//!
//! # Example
//!
//! ```rust,ignore
//! use posting_validation::{PipelineConfig, ValidationPipeline, RawContent};
//!
//! let pipeline = ValidationPipeline::new(PipelineConfig::default(), engine)?;
//! let (outcome, audit) = pipeline.run(RawContent::html(url, body), None).await;
//! ```

pub mod state;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use url::Url;

use crate::classify::ContentClassifier;
use crate::engine::{EngineUsage, InferenceOrchestrator};
use crate::error::{ConfigResult, PipelineError, SinkError};
use crate::extract::StructuralExtractor;
use crate::quality::{QualityGate, Verdict};
use crate::text;
use crate::traits::engine::InferenceEngine;
use crate::traits::sink::RunSink;
use crate::types::audit::{AuditRecord, CircuitState, PipelineState};
use crate::types::classification::Category;
use crate::types::config::PipelineConfig;
use crate::types::content::{FieldOverrides, RawContent};
use crate::types::outcome::{
    ClassificationRejection, QualityRejection, RejectionReason, ValidationOutcome,
};
use crate::types::quality::QualityAssessment;

pub use state::{next_state, StageReport};

/// The validation pipeline.
///
/// Cheap to share behind an `Arc`; runs are independent apart from the
/// orchestrator's circuit breaker.
pub struct ValidationPipeline {
    config: PipelineConfig,
    orchestrator: Option<Arc<InferenceOrchestrator>>,
    classifier: ContentClassifier,
    extractor: StructuralExtractor,
    gate: QualityGate,
}

impl std::fmt::Debug for ValidationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationPipeline")
            .field("config", &self.config)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl ValidationPipeline {
    /// Build a pipeline around `engine`.
    pub fn new(config: PipelineConfig, engine: Arc<dyn InferenceEngine>) -> ConfigResult<Self> {
        let orchestrator = Arc::new(InferenceOrchestrator::new(engine, config.engine.clone()));
        Self::with_orchestrator(config, orchestrator)
    }

    /// Build a pipeline sharing an existing orchestrator, and with it the
    /// circuit breaker.
    pub fn with_orchestrator(
        config: PipelineConfig,
        orchestrator: Arc<InferenceOrchestrator>,
    ) -> ConfigResult<Self> {
        config.validate()?;
        let mut pipeline = Self::assemble(config);
        pipeline.classifier = pipeline.classifier.with_orchestrator(orchestrator.clone());
        pipeline.extractor = pipeline.extractor.with_orchestrator(orchestrator.clone());
        pipeline.orchestrator = Some(orchestrator);
        Ok(pipeline)
    }

    /// Build a pipeline that never consults an engine.
    pub fn rules_only(config: PipelineConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::assemble(config))
    }

    fn assemble(config: PipelineConfig) -> Self {
        let cap = config.degraded_confidence_cap;
        Self {
            classifier: ContentClassifier::new(config.classifier.clone(), cap),
            extractor: StructuralExtractor::new(config.extractor.clone(), cap)
                .with_quality(&config.quality),
            gate: QualityGate::new(config.quality.clone(), config.classifier.ambiguous_high),
            orchestrator: None,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn gate(&self) -> &QualityGate {
        &self.gate
    }

    pub fn orchestrator(&self) -> Option<&Arc<InferenceOrchestrator>> {
        self.orchestrator.as_ref()
    }

    /// Current breaker state; `Closed` when no engine is wired.
    pub fn circuit_state(&self) -> CircuitState {
        self.orchestrator
            .as_ref()
            .map(|o| o.circuit_state())
            .unwrap_or(CircuitState::Closed)
    }

    /// Validate one piece of content.
    pub async fn run(
        &self,
        content: RawContent,
        overrides: Option<FieldOverrides>,
    ) -> (ValidationOutcome, AuditRecord) {
        self.run_with_cancel(content, overrides, CancellationToken::new())
            .await
    }

    /// Validate one piece of content, stopping early if `cancel` fires.
    ///
    /// The token is checked between stages. An engine call already in
    /// flight finishes (or times out) first.
    pub async fn run_with_cancel(
        &self,
        content: RawContent,
        overrides: Option<FieldOverrides>,
        cancel: CancellationToken,
    ) -> (ValidationOutcome, AuditRecord) {
        let mut audit = AuditRecord::begin(&content, self.circuit_state());
        let span = info_span!(
            "validation_run",
            session_id = %audit.session_id,
            url = %content.url,
        );

        let mut usage = EngineUsage::new();
        let driven = AssertUnwindSafe(self.drive(
            &content,
            overrides.as_ref(),
            &cancel,
            &mut audit,
            &mut usage,
        ))
        .catch_unwind()
        .instrument(span.clone())
        .await;

        let outcome = span.in_scope(|| match driven {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(failure)) => {
                warn!(error = %failure, "Run failed");
                fail(&mut audit, &failure)
            }
            Err(panic) => {
                let stage = audit.terminal_state.as_str();
                let message = extract_panic_message(&panic);
                error!(stage, panic = %message, "Stage panicked");
                fail(&mut audit, &PipelineError::Panicked { stage, message })
            }
        });

        audit.engine_calls_made = usage.calls_made;
        audit.engine_failures = usage.failures;
        audit.circuit_transitions = usage.transitions;
        audit.circuit_state = self.circuit_state();
        audit.finish(&outcome);

        span.in_scope(|| {
            info!(
                status = ?outcome.status,
                code = outcome.rejection_reason.as_ref().map(|r| r.code()),
                engine_calls = audit.engine_calls_made,
                degraded = audit.degraded,
                "Validation run finished"
            )
        });
        (outcome, audit)
    }

    /// Run and hand both artifacts to `sink`.
    ///
    /// The outcome is returned even when the sink fails.
    pub async fn run_and_record(
        &self,
        content: RawContent,
        overrides: Option<FieldOverrides>,
        sink: &dyn RunSink,
    ) -> (ValidationOutcome, AuditRecord, Result<(), SinkError>) {
        let (outcome, audit) = self.run(content, overrides).await;
        let recorded = sink.record(&outcome, &audit).await;
        if let Err(error) = &recorded {
            warn!(session_id = %audit.session_id, error = %error, "Failed to record run");
        }
        (outcome, audit, recorded)
    }

    async fn drive(
        &self,
        content: &RawContent,
        overrides: Option<&FieldOverrides>,
        cancel: &CancellationToken,
        audit: &mut AuditRecord,
        usage: &mut EngineUsage,
    ) -> Result<ValidationOutcome, PipelineError> {
        // URL_CHECK
        checkpoint(cancel, PipelineState::UrlCheck)?;
        advance(audit, StageReport::Proceed)?;
        if let Err(detail) = check_accessibility(content) {
            info!(%detail, "Content not accessible");
            advance(audit, StageReport::Reject)?;
            return Ok(ValidationOutcome::rejected(
                RejectionReason::AccessibilityFailure { detail },
                QualityAssessment::not_assessed(),
            ));
        }

        // CLASSIFY
        checkpoint(cancel, PipelineState::Classify)?;
        advance(audit, StageReport::Proceed)?;
        let visible = text::visible_text(content);
        // Cancellation is honoured at the next boundary, never mid-call.
        let classification = self.classifier.classify(content, &visible, usage).await;
        audit.category = Some(classification.category);
        audit.degraded |= classification.degraded;

        if !self.classifier.qualifies_for_extraction(&classification) {
            let cause = match classification.category {
                Category::NonJob => ClassificationRejection::NonJob,
                Category::Expired => ClassificationRejection::Expired,
                Category::LoginRequired => ClassificationRejection::LoginRequired,
                Category::JobPosting | Category::Ambiguous => {
                    ClassificationRejection::AmbiguousUnresolved
                }
            };
            info!(category = %classification.category, "Classification rejected content");
            advance(audit, StageReport::Reject)?;
            return Ok(ValidationOutcome::rejected(
                RejectionReason::ClassificationRejected { cause },
                QualityAssessment::not_assessed(),
            ));
        }

        // EXTRACT
        checkpoint(cancel, PipelineState::Extract)?;
        advance(audit, StageReport::Proceed)?;
        let report = self
            .extractor
            .extract(content, &visible, classification.platform, overrides, usage)
            .await;
        audit.degraded |= report.degraded;

        // QUALITY_GATE
        checkpoint(cancel, PipelineState::QualityGate)?;
        advance(audit, StageReport::Proceed)?;
        let decision = self.gate.evaluate(&report, Some(&classification));

        match decision.verdict {
            Verdict::Reject(reason) => {
                let reason = if audit.degraded && !is_placeholder(&reason) {
                    debug!(gate = reason.code(), "Degraded run could not pass the gate");
                    engine_failure(usage)
                } else {
                    reason
                };
                advance(audit, StageReport::Reject)?;
                Ok(ValidationOutcome::rejected(reason, decision.assessment))
            }
            Verdict::Warn => {
                advance(audit, StageReport::Warn)?;
                let outcome = ValidationOutcome::warned(report.field_values(), decision.assessment);
                if audit.degraded {
                    Ok(outcome.with_absorbed_failure(engine_failure(usage)))
                } else {
                    Ok(outcome)
                }
            }
            Verdict::Accept => {
                advance(audit, StageReport::Accept)?;
                Ok(ValidationOutcome::accepted(
                    report.field_values(),
                    decision.assessment,
                ))
            }
        }
    }
}

/// Move the audit's state machine forward.
fn advance(audit: &mut AuditRecord, report: StageReport) -> Result<PipelineState, PipelineError> {
    let from = audit.terminal_state;
    let to = next_state(from, report).ok_or_else(|| PipelineError::InvalidTransition {
        from: from.as_str(),
        report: format!("{report:?}"),
    })?;
    debug!(from = from.as_str(), to = to.as_str(), "Pipeline transition");
    audit.enter(to);
    Ok(to)
}

/// Enter FAILED and build the matching outcome.
fn fail(audit: &mut AuditRecord, failure: &PipelineError) -> ValidationOutcome {
    if !audit.terminal_state.is_terminal() {
        audit.enter(PipelineState::Failed);
    }
    ValidationOutcome::rejected(failure.rejection_reason(), QualityAssessment::not_assessed())
}

fn checkpoint(cancel: &CancellationToken, next: PipelineState) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled {
            stage: next.as_str(),
        });
    }
    Ok(())
}

/// Accessibility metadata check.
pub fn check_accessibility(content: &RawContent) -> Result<(), String> {
    let url = Url::parse(&content.url).map_err(|e| format!("invalid URL: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme {}", url.scheme()));
    }
    if let Some(error) = content.fetch_error {
        return Err(format!("fetch failed: {error:?}").to_lowercase());
    }
    if let Some(status) = content.http_status {
        if !(200..300).contains(&status) {
            return Err(format!("HTTP {status}"));
        }
    }
    if !content.has_content() {
        return Err("empty body".to_string());
    }
    Ok(())
}

/// The engine failure a degraded run fell back from.
fn engine_failure(usage: &EngineUsage) -> RejectionReason {
    RejectionReason::EngineFailure {
        detail: usage
            .failures
            .last()
            .cloned()
            .unwrap_or_else(|| "ENGINE_UNAVAILABLE".to_string()),
    }
}

fn is_placeholder(reason: &RejectionReason) -> bool {
    matches!(
        reason,
        RejectionReason::QualityGateRejected {
            cause: QualityRejection::PlaceholderDetected
        }
    )
}

fn extract_panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEngine;
    use crate::types::content::{ContentKind, FetchError};
    use crate::types::outcome::OutcomeStatus;

    const AMBIGUOUS_PAGE: &str = r#"<html><head><title>Backend Engineer | Acme Corp</title></head><body>
        <h1>Backend Engineer</h1>
        <p>Company: Acme Corp</p>
        <h2>Responsibilities</h2>
        <p>You will design, build and operate the payment services that thousands of merchants rely on every day, together with product.</p>
        <h2>Requirements</h2>
        <ul><li>Five years of Rust or Go</li><li>Experience running services in production</li></ul>
        <a href="/apply">Apply now</a>
        </body></html>"#;

    fn ambiguous() -> RawContent {
        RawContent::html("https://acme.com/jobs/backend-engineer", AMBIGUOUS_PAGE)
    }

    #[test]
    fn test_accessibility_checks() {
        let ok = RawContent::html("https://acme.com/jobs/1", "<p>hi</p>");
        assert!(check_accessibility(&ok).is_ok());

        let ftp = RawContent::html("ftp://acme.com/jobs/1", "<p>hi</p>");
        assert!(check_accessibility(&ftp).unwrap_err().contains("scheme"));

        let gone = RawContent::html("https://acme.com/jobs/1", "<p>hi</p>").with_status(404);
        assert_eq!(check_accessibility(&gone).unwrap_err(), "HTTP 404");

        let blocked = RawContent::html("https://acme.com/jobs/1", "")
            .with_fetch_error(FetchError::Forbidden);
        assert!(check_accessibility(&blocked).unwrap_err().contains("forbidden"));

        let empty = RawContent::new("https://acme.com/jobs/1", "  ", ContentKind::Manual);
        assert_eq!(check_accessibility(&empty).unwrap_err(), "empty body");
    }

    #[tokio::test]
    async fn test_inaccessible_content_stops_at_url_check() {
        let pipeline = ValidationPipeline::rules_only(PipelineConfig::default()).unwrap();
        let content = RawContent::html("not a url", "<p>x</p>");
        let (outcome, audit) = pipeline.run(content, None).await;

        assert_eq!(outcome.rejection_reason.as_ref().unwrap().code(), "ACCESSIBILITY_FAILURE");
        assert_eq!(
            audit.path(),
            vec![PipelineState::Init, PipelineState::UrlCheck, PipelineState::Rejected]
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let pipeline = ValidationPipeline::rules_only(PipelineConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (outcome, audit) = pipeline.run_with_cancel(ambiguous(), None, cancel).await;
        assert_eq!(outcome.rejection_reason, Some(RejectionReason::Cancelled));
        assert!(outcome.rejection_reason.as_ref().unwrap().is_retryable());
        assert_eq!(audit.terminal_state, PipelineState::Failed);
        assert!(audit.stages_executed.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_engine_call_waits_for_stage_boundary() {
        let engine = Arc::new(
            MockEngine::new()
                .with_classification(Category::JobPosting, 0.9)
                .with_delay(std::time::Duration::from_secs(5)),
        );
        let pipeline = ValidationPipeline::new(PipelineConfig::default(), engine.clone()).unwrap();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let (outcome, audit) = pipeline.run_with_cancel(ambiguous(), None, cancel).await;
        assert_eq!(outcome.rejection_reason, Some(RejectionReason::Cancelled));
        assert_eq!(audit.terminal_state, PipelineState::Failed);

        // The classify call ran to completion; the run stopped before EXTRACT.
        assert!(audit.executed(PipelineState::Classify));
        assert!(!audit.executed(PipelineState::Extract));
        assert_eq!(audit.category, Some(Category::JobPosting));
        assert_eq!(engine.classify_calls(), 1);
        assert_eq!(engine.extract_calls(), 0);
        assert_eq!(audit.engine_calls_made, 1);
        assert!(audit.engine_failures.is_empty());

        let breaker = pipeline.orchestrator().unwrap().breaker();
        assert_eq!(breaker.consecutive_failures(), 0);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_panicking_engine_becomes_system_error() {
        let engine = MockEngine::new().panicking();
        let pipeline =
            ValidationPipeline::new(PipelineConfig::default(), Arc::new(engine)).unwrap();

        let (outcome, audit) = pipeline.run(ambiguous(), None).await;
        assert_eq!(outcome.status, OutcomeStatus::Rejected);
        match outcome.rejection_reason.unwrap() {
            RejectionReason::SystemError { detail } => {
                assert!(detail.contains("mock engine panicked"));
                assert!(detail.contains("CLASSIFY"));
            }
            other => panic!("unexpected reason {other:?}"),
        }
        assert_eq!(audit.terminal_state, PipelineState::Failed);
        assert!(audit.finished_at.is_some());
    }

    #[test]
    fn test_invalid_config_is_refused() {
        let mut config = PipelineConfig::default();
        config.quality.reject_threshold = 0.9;
        assert!(ValidationPipeline::rules_only(config).is_err());
    }
}
