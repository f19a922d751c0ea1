//! Job posting validation.
//!
//! Decides whether raw content (a fetched page, extracted PDF text or
//! pasted text) is a real, live job posting and, if so, extracts a
//! structured record with calibrated confidence. Results that contain
//! placeholder or fabricated values are refused before they reach a caller.
//!
//! # Architecture
//!
//! ```text
//! RawContent
//!     │
//!     ▼
//! URL_CHECK ──► CLASSIFY ──► EXTRACT ──► QUALITY_GATE
//!                  │             │
//!                  └──── InferenceOrchestrator ────┐
//!                        (timeout, retry, breaker) │
//!                                                  ▼
//!                                          dyn InferenceEngine
//! ```
//!
//! Deterministic rules always run first. The engine is consulted only
//! for ambiguous classifications and for fields the rules could not
//! settle, and everything it proposes must be grounded in the source text.
//! When the engine fails the pipeline degrades to rules and says so.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use posting_validation::{HttpInferenceEngine, PipelineConfig, RawContent, ValidationPipeline};
//!
//! let engine = Arc::new(HttpInferenceEngine::from_env()?);
//! let pipeline = ValidationPipeline::new(PipelineConfig::from_env()?, engine)?;
//!
//! let (outcome, audit) = pipeline
//!     .run(RawContent::html("https://acme.com/careers/backend", html), None)
//!     .await;
//! println!("{:?} ({} engine calls)", outcome.status, audit.engine_calls_made);
//! ```

pub mod classify;
pub mod engine;
pub mod engines;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod quality;
pub mod stores;
pub mod testing;
pub mod text;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{ConfigError, EngineError, PipelineError, SinkError};
pub use traits::{engine::InferenceEngine, sink::RunSink};
pub use types::{
    audit::{AuditRecord, CircuitState, CircuitTransition, PipelineState, StageEntry},
    candidate::{CandidateSource, ExtractionCandidate, ExtractionReport, JobField},
    classification::{Category, ClassificationResult, Platform, Signal, SignalKind},
    config::{
        ClassifierConfig, EngineConfig, ExtractorConfig, InferenceStrategy, PipelineConfig,
        QualityConfig,
    },
    content::{ContentKind, FetchError, FieldOverrides, RawContent},
    outcome::{
        ClassificationRejection, OutcomeStatus, QualityRejection, RejectionReason,
        ValidationOutcome,
    },
    quality::{Issue, IssueKind, QualityAssessment, Severity},
};

pub use classify::ContentClassifier;
pub use engine::{CircuitBreaker, EngineUsage, InferenceOrchestrator};
pub use engines::{DisabledEngine, HttpInferenceEngine};
pub use extract::StructuralExtractor;
pub use pipeline::ValidationPipeline;
pub use quality::{GateDecision, PlaceholderDetector, QualityGate, Verdict};
pub use stores::{JsonLinesSink, MemorySink};
