//! Inference orchestration.
//!
//! [`InferenceOrchestrator`] wraps an [`InferenceEngine`] with a per-attempt
//! timeout, an overall budget, retry with exponential backoff, and the
//! process-wide [`CircuitBreaker`]. It knows nothing about jobs; callers get
//! one of three [`EngineError`]s and decide how to degrade.
//!
//! Construct one orchestrator per process and share it with `Arc`.

pub mod circuit;

use std::future::Future;
use std::sync::Arc;

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use crate::traits::engine::{EngineCandidate, EngineClassification, InferenceEngine};
use crate::types::audit::{CircuitState, CircuitTransition};
use crate::types::candidate::JobField;
use crate::types::config::EngineConfig;

pub use circuit::{BreakerPermit, CircuitBreaker, StateChange};

/// Per-run ledger of engine usage, copied into the audit record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineUsage {
    /// Attempts actually sent to the engine.
    pub calls_made: u32,
    /// Error codes of failed calls, in order.
    pub failures: Vec<String>,
    /// Breaker transitions caused by this run.
    pub transitions: Vec<CircuitTransition>,
}

impl EngineUsage {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_change(&mut self, change: Option<StateChange>) {
        if let Some(change) = change {
            self.transitions.push(CircuitTransition {
                from: change.from,
                to: change.to,
                attempt: self.calls_made,
            });
        }
    }

    fn record_failure(&mut self, error: &EngineError) {
        self.failures.push(error.code().to_string());
    }
}

/// Engine wrapper with timeout, retry and circuit breaking.
pub struct InferenceOrchestrator {
    engine: Arc<dyn InferenceEngine>,
    breaker: CircuitBreaker,
    config: EngineConfig,
}

impl InferenceOrchestrator {
    pub fn new(engine: Arc<dyn InferenceEngine>, config: EngineConfig) -> Self {
        let breaker = CircuitBreaker::new(config.failure_threshold, config.cooldown());
        Self {
            engine,
            breaker,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Ask the engine what the content is.
    ///
    /// Answers below the confidence floor fail with `LowConfidence`.
    pub async fn classify(
        &self,
        content: &str,
        usage: &mut EngineUsage,
    ) -> EngineResult<EngineClassification> {
        let content = truncate_chars(content, self.config.max_content_chars);
        let engine = &self.engine;
        let answer = self
            .call("classify", usage, || engine.classify(content))
            .await?;

        let floor = self.config.confidence_floor;
        if answer.confidence < floor {
            let error = EngineError::LowConfidence {
                confidence: answer.confidence,
                floor,
            };
            usage.record_failure(&error);
            debug!(confidence = answer.confidence, floor, "Engine classification below floor");
            return Err(error);
        }
        Ok(answer)
    }

    /// Ask the engine for values of `hints`.
    ///
    /// Candidates for fields outside `hints` or below the confidence floor
    /// are dropped. Fails with `LowConfidence` when the engine proposed
    /// candidates and none survived the floor.
    pub async fn extract(
        &self,
        content: &str,
        hints: &[JobField],
        usage: &mut EngineUsage,
    ) -> EngineResult<Vec<EngineCandidate>> {
        let content = truncate_chars(content, self.config.max_content_chars);
        let engine = &self.engine;
        let proposed = self
            .call("extract", usage, || engine.extract(content, hints))
            .await?;

        let floor = self.config.confidence_floor;
        let relevant: Vec<EngineCandidate> = proposed
            .into_iter()
            .filter(|c| hints.contains(&c.field) && !c.value.trim().is_empty())
            .collect();
        let best = relevant.iter().map(|c| c.confidence).fold(0.0_f32, f32::max);
        let kept: Vec<EngineCandidate> = relevant
            .iter()
            .filter(|c| c.confidence >= floor)
            .cloned()
            .collect();

        if kept.is_empty() && !relevant.is_empty() {
            let error = EngineError::LowConfidence {
                confidence: best,
                floor,
            };
            usage.record_failure(&error);
            return Err(error);
        }
        Ok(kept)
    }

    /// Run one logical call: retries, backoff, budget and breaker.
    async fn call<T, F, Fut>(
        &self,
        operation: &'static str,
        usage: &mut EngineUsage,
        attempt_fn: F,
    ) -> EngineResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        let budget = self.config.overall_budget();
        let deadline = Instant::now() + budget;
        let mut retries = 0;

        loop {
            let permit = match self.breaker.acquire() {
                Ok(permit) => permit,
                Err(state) => {
                    let error = EngineError::unavailable(format!(
                        "circuit breaker {}",
                        match state {
                            CircuitState::HalfOpen => "half-open, trial in flight",
                            _ => "open",
                        }
                    ));
                    debug!(operation, "Engine call short-circuited");
                    usage.record_failure(&error);
                    return Err(error);
                }
            };

            usage.calls_made += 1;
            usage.record_change(permit.admitted_change());

            let remaining = deadline.saturating_duration_since(Instant::now());
            let limit = self.config.call_timeout().min(remaining);
            let started = Instant::now();
            let result = match timeout(limit, attempt_fn()).await {
                Ok(result) => result,
                Err(_) => Err(EngineError::Timeout {
                    elapsed: started.elapsed(),
                }),
            };

            let error = match result {
                Ok(value) => {
                    usage.record_change(permit.succeed());
                    return Ok(value);
                }
                Err(error) => error,
            };

            let change = if error.trips_breaker() {
                permit.fail()
            } else {
                permit.succeed()
            };
            usage.record_change(change);
            usage.record_failure(&error);
            warn!(
                operation,
                attempt = usage.calls_made,
                code = error.code(),
                error = %error,
                "Engine call failed"
            );

            if !error.is_retryable() || retries >= self.config.max_retries {
                return Err(error);
            }

            retries += 1;
            let backoff = self.config.backoff(retries);
            if Instant::now() + backoff >= deadline {
                debug!(operation, "Engine budget exhausted, not retrying");
                return Err(error);
            }
            sleep(backoff).await;
        }
    }
}

/// Prefix of `text` holding at most `max` characters.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
