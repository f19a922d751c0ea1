//! Testing utilities including a scripted inference engine.
//!
//! Useful for exercising the pipeline without a real engine.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{EngineError, EngineResult};
use crate::traits::engine::{EngineCandidate, EngineClassification, InferenceEngine};
use crate::types::candidate::JobField;
use crate::types::classification::Category;

/// A scripted inference engine.
///
/// Returns the configured classification and candidates, or fails the way
/// it is told to. Every call is recorded for assertions.
#[derive(Default, Clone)]
pub struct MockEngine {
    classification: Option<EngineClassification>,

    candidates: Vec<EngineCandidate>,

    /// Error returned instead of an answer.
    failure: Option<EngineError>,

    /// How many calls fail before answers resume. `None` fails forever.
    failures_left: Arc<RwLock<Option<u32>>>,

    /// Simulated latency per call.
    delay: Option<Duration>,

    panics: bool,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockEngineCall>>>,
}

/// Record of a call made to the mock engine.
#[derive(Debug, Clone, PartialEq)]
pub enum MockEngineCall {
    Classify { content_len: usize },
    Extract { content_len: usize, hints: Vec<JobField> },
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer classification requests with this verdict.
    pub fn with_classification(mut self, category: Category, confidence: f32) -> Self {
        self.classification = Some(EngineClassification::new(category, confidence));
        self
    }

    /// Propose this candidate on extraction requests.
    pub fn with_candidate(mut self, field: JobField, value: impl Into<String>, confidence: f32) -> Self {
        self.candidates
            .push(EngineCandidate::new(field, value, confidence));
        self
    }

    /// Fail every call with `error`.
    pub fn failing_with(mut self, error: EngineError) -> Self {
        self.failure = Some(error);
        self.failures_left = Arc::new(RwLock::new(None));
        self
    }

    /// Fail the first `n` calls with `error`, then answer normally.
    pub fn failing_first(mut self, n: u32, error: EngineError) -> Self {
        self.failure = Some(error);
        self.failures_left = Arc::new(RwLock::new(Some(n)));
        self
    }

    /// Every call reports a timeout immediately.
    pub fn always_timeout(self) -> Self {
        self.failing_with(EngineError::Timeout {
            elapsed: Duration::from_secs(8),
        })
    }

    pub fn always_unavailable(self) -> Self {
        self.failing_with(EngineError::unavailable("mock engine offline"))
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Panic on every call.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn calls(&self) -> Vec<MockEngineCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    pub fn classify_calls(&self) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, MockEngineCall::Classify { .. }))
            .count()
    }

    pub fn extract_calls(&self) -> usize {
        self.call_count() - self.classify_calls()
    }

    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }

    async fn respond(&self, call: MockEngineCall) -> EngineResult<()> {
        self.calls.write().unwrap().push(call);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panics {
            panic!("mock engine panicked");
        }

        if let Some(error) = &self.failure {
            let mut left = self.failures_left.write().unwrap();
            match left.as_mut() {
                None => return Err(error.clone()),
                Some(0) => {}
                Some(n) => {
                    *n -= 1;
                    return Err(error.clone());
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl InferenceEngine for MockEngine {
    async fn classify(&self, content: &str) -> EngineResult<EngineClassification> {
        self.respond(MockEngineCall::Classify {
            content_len: content.len(),
        })
        .await?;

        self.classification
            .clone()
            .ok_or_else(|| EngineError::unavailable("no classification scripted"))
    }

    async fn extract(&self, content: &str, hints: &[JobField]) -> EngineResult<Vec<EngineCandidate>> {
        self.respond(MockEngineCall::Extract {
            content_len: content.len(),
            hints: hints.to_vec(),
        })
        .await?;

        Ok(self.candidates.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
