//! Cross-cutting guarantees of the pipeline.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use posting_validation::testing::MockEngine;
use posting_validation::{
    Category, CircuitState, EngineConfig, EngineError, EngineUsage, InferenceOrchestrator,
    JobField, MemorySink, OutcomeStatus, PipelineConfig, PipelineState, PlaceholderDetector,
    QualityConfig, QualityGate, RawContent, RejectionReason, ValidationPipeline, Verdict,
};
use proptest::prelude::*;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_anti_patterns_never_reach_extraction() {
    let pages = [
        "https://acme.com/",
        "https://acme.com/privacy",
        "https://acme.com/blog/why-we-hire-remote/",
        "https://acme.com/shop/products/widget",
        "https://acme.com/careers",
        "https://acme.com/jobs/search?q=engineer",
    ];
    for url in pages {
        let (engine, pipeline) = pipeline_with(MockEngine::new());
        let content = RawContent::html(url, ambiguous_posting().body);

        let (outcome, audit) = pipeline.run(content, None).await;

        assert_eq!(outcome.status, OutcomeStatus::Rejected, "{url}");
        assert_eq!(audit.category, Some(Category::NonJob), "{url}");
        assert!(!audit.executed(PipelineState::Extract), "{url}");
        assert_eq!(engine.extract_calls(), 0, "{url}");
    }
}

#[tokio::test]
async fn test_accepted_fields_pass_the_gate_again() {
    let (_, pipeline) = pipeline_with(MockEngine::new());
    let (outcome, _) = pipeline.run(senior_backend_posting(), None).await;
    assert_eq!(outcome.status, OutcomeStatus::Accepted);

    let fields = outcome.fields.unwrap();
    let detector = PlaceholderDetector::default();
    assert!(fields.values().all(|v| !detector.is_forbidden(v)));

    let again = pipeline.gate().evaluate_fields(&fields);
    assert_eq!(again.verdict, Verdict::Accept);
}

#[tokio::test]
async fn test_runs_are_deterministic_with_a_stubbed_engine() {
    let engine = MockEngine::new()
        .with_classification(Category::JobPosting, 0.9)
        .with_candidate(JobField::Location, "Berlin", 0.8);
    let (_, pipeline) = pipeline_with(engine);

    let (first, first_audit) = pipeline.run(ambiguous_posting(), None).await;
    let (second, second_audit) = pipeline.run(ambiguous_posting(), None).await;

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );

    assert_ne!(first_audit.session_id, second_audit.session_id);
    assert_eq!(first_audit.path(), second_audit.path());
    assert_eq!(first_audit.content_digest, second_audit.content_digest);
    assert_eq!(first_audit.engine_calls_made, second_audit.engine_calls_made);
    assert_eq!(first_audit.engine_failures, second_audit.engine_failures);
    assert_eq!(first_audit.category, second_audit.category);
}

#[tokio::test(start_paused = true)]
async fn test_sixth_call_is_refused_without_reaching_the_engine() {
    let engine = Arc::new(MockEngine::new().always_timeout());
    let orchestrator =
        InferenceOrchestrator::new(engine.clone(), EngineConfig::default().with_max_retries(0));
    let mut usage = EngineUsage::new();

    for _ in 0..5 {
        let result = orchestrator.classify("content", &mut usage).await;
        assert!(matches!(result, Err(EngineError::Timeout { .. })));
    }
    assert_eq!(orchestrator.circuit_state(), CircuitState::Open);

    let sixth = orchestrator.classify("content", &mut usage).await;
    assert!(matches!(sixth, Err(EngineError::Unavailable { .. })));
    assert_eq!(engine.call_count(), 5);
    assert_eq!(usage.calls_made, 5);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_is_shared_between_pipelines() {
    let engine = Arc::new(MockEngine::new().always_unavailable());
    let orchestrator = Arc::new(InferenceOrchestrator::new(
        engine.clone(),
        EngineConfig::default().with_failure_threshold(2),
    ));
    let first = ValidationPipeline::with_orchestrator(PipelineConfig::default(), orchestrator.clone())
        .unwrap();
    let second = ValidationPipeline::with_orchestrator(PipelineConfig::default(), orchestrator)
        .unwrap();

    // Classify and extract each fail once: the breaker opens.
    let (_, audit) = first.run(ambiguous_posting(), None).await;
    assert_eq!(audit.circuit_state, CircuitState::Open);
    assert_eq!(engine.call_count(), 2);

    let (outcome, audit) = second.run(ambiguous_posting(), None).await;
    assert_eq!(audit.engine_calls_made, 0);
    assert_eq!(engine.call_count(), 2);
    assert!(audit.degraded);
    assert_eq!(outcome.status, OutcomeStatus::Warned);

    // After the cooldown a single trial goes through.
    tokio::time::advance(Duration::from_secs(61)).await;
    let (_, audit) = second.run(ambiguous_posting(), None).await;
    assert_eq!(audit.engine_calls_made, 1);
}

#[tokio::test(start_paused = true)]
async fn test_caller_cancellations_leave_the_breaker_closed() {
    let engine = Arc::new(
        MockEngine::new()
            .with_classification(Category::JobPosting, 0.9)
            .with_delay(Duration::from_secs(2)),
    );
    let orchestrator = Arc::new(InferenceOrchestrator::new(engine.clone(), EngineConfig::default()));
    let pipeline = ValidationPipeline::with_orchestrator(PipelineConfig::default(), orchestrator.clone())
        .unwrap();

    for _ in 0..5 {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let (outcome, audit) = pipeline.run_with_cancel(ambiguous_posting(), None, cancel).await;
        assert_eq!(outcome.rejection_reason, Some(RejectionReason::Cancelled));
        assert!(audit.executed(PipelineState::Classify));
        assert!(!audit.executed(PipelineState::Extract));
    }
    assert_eq!(orchestrator.circuit_state(), CircuitState::Closed);
    assert_eq!(orchestrator.breaker().consecutive_failures(), 0);
    assert_eq!(engine.classify_calls(), 5);

    let (_, audit) = pipeline.run(ambiguous_posting(), None).await;
    assert!(audit.engine_calls_made >= 1);
    assert!(!audit.degraded);
    assert!(audit.executed(PipelineState::Extract));
}

#[tokio::test]
async fn test_rules_only_pipeline_never_consults_an_engine() {
    let pipeline = ValidationPipeline::rules_only(PipelineConfig::rules_only()).unwrap();
    let (outcome, audit) = pipeline.run(ambiguous_posting(), None).await;

    assert_eq!(audit.engine_calls_made, 0);
    assert!(!audit.degraded);
    // Rule score 0.65 stays below the confident band.
    assert_eq!(outcome.status, OutcomeStatus::Warned);
    assert!(pipeline.orchestrator().is_none());
}

#[tokio::test]
async fn test_run_and_record_hands_artifacts_to_sink() {
    let (_, pipeline) = pipeline_with(MockEngine::new());
    let sink = MemorySink::new();

    let (outcome, audit, recorded) = pipeline
        .run_and_record(senior_backend_posting(), None, &sink)
        .await;
    assert_ok!(recorded);

    let stored = sink.get(audit.session_id).unwrap();
    assert_eq!(stored.outcome, outcome);
    assert_eq!(stored.audit.terminal_state, PipelineState::Accepted);
    assert!(stored.audit.finished_at.is_some());
}

#[test]
fn test_invalid_configuration_is_refused() {
    let config = PipelineConfig::default()
        .with_quality(QualityConfig::default().with_required_fields(Vec::<JobField>::new()));
    assert_err!(ValidationPipeline::rules_only(config));
}

fn word() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "senior", "backend", "engineer", "platform", "payments", "acme", "globex", "berlin",
        "rust", "services", "team", "build", "operate", "unknown", "company", "position", "n/a",
    ])
    .prop_map(str::to_string)
}

fn phrase(min: usize, max: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(word(), min..max).prop_map(|w| w.join(" "))
}

proptest! {
    #[test]
    fn prop_gate_never_accepts_placeholders(
        title in phrase(1, 5),
        company in phrase(1, 3),
        description in phrase(15, 40),
    ) {
        let gate = QualityGate::new(QualityConfig::default(), 0.7);
        let fields = BTreeMap::from([
            (JobField::Title, title),
            (JobField::Company, company),
            (JobField::Description, description),
        ]);

        let decision = gate.evaluate_fields(&fields);
        if !matches!(decision.verdict, Verdict::Reject(_)) {
            let detector = PlaceholderDetector::default();
            prop_assert!(fields.values().all(|v| !detector.is_forbidden(v)));

            // Idempotent through the gate alone.
            let again = gate.evaluate_fields(&fields);
            prop_assert_eq!(again.verdict, decision.verdict);
        }
        prop_assert!((0.0..=1.0).contains(&decision.assessment.overall_score));
    }
}
