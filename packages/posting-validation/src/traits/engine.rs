//! Inference engine trait.
//!
//! Implementations wrap a concrete engine and report failures as
//! [`EngineError`]. Timeouts, retries and the circuit breaker live in
//! [`InferenceOrchestrator`](crate::engine::InferenceOrchestrator), not here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::types::candidate::JobField;
use crate::types::classification::Category;

/// The engine's opinion on what the content is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineClassification {
    pub category: Category,
    pub confidence: f32,
}

impl EngineClassification {
    pub fn new(category: Category, confidence: f32) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// A field value proposed by the engine.
///
/// Untrusted until grounded against the source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineCandidate {
    pub field: JobField,
    pub value: String,
    pub confidence: f32,
}

impl EngineCandidate {
    pub fn new(field: JobField, value: impl Into<String>, confidence: f32) -> Self {
        Self {
            field,
            value: value.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// External inference engine.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Classify the content.
    async fn classify(&self, content: &str) -> EngineResult<EngineClassification>;

    /// Propose values for `hints`, the fields the rules could not settle.
    ///
    /// Engines may return fields outside `hints`; callers filter them.
    async fn extract(&self, content: &str, hints: &[JobField]) -> EngineResult<Vec<EngineCandidate>>;

    /// Engine name for logs.
    fn name(&self) -> &str {
        "engine"
    }
}
