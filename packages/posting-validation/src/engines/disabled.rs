//! An engine that is never there.

use async_trait::async_trait;

use crate::error::{EngineError, EngineResult};
use crate::traits::engine::{EngineCandidate, EngineClassification, InferenceEngine};
use crate::types::candidate::JobField;

/// Always reports `Unavailable`.
///
/// Wiring this in a hybrid pipeline exercises the degraded path: every
/// result falls back to rules, capped, and the breaker opens after
/// `failure_threshold` runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledEngine;

#[async_trait]
impl InferenceEngine for DisabledEngine {
    async fn classify(&self, _content: &str) -> EngineResult<EngineClassification> {
        Err(EngineError::unavailable("inference engine disabled"))
    }

    async fn extract(&self, _content: &str, _hints: &[JobField]) -> EngineResult<Vec<EngineCandidate>> {
        Err(EngineError::unavailable("inference engine disabled"))
    }

    fn name(&self) -> &str {
        "disabled"
    }
}
