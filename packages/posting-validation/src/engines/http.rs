//! HTTP inference engine client.
//!
//! Protocol: `POST {endpoint}` with
//! `{"task": "classify"|"extract", "content": .., "schema_hints": [..]}`,
//! answered by `{"result": .., "confidence": ..}`.
//!
//! For `classify` the result is a category name. For `extract` it is an
//! object keyed by field name whose values are either plain strings (scored
//! with the top-level confidence) or `{"value", "confidence"}` objects.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{ConfigError, EngineError, EngineResult};
use crate::traits::engine::{EngineCandidate, EngineClassification, InferenceEngine};
use crate::types::candidate::JobField;
use crate::types::classification::Category;

/// Environment variable holding the engine endpoint.
pub const ENGINE_URL_VAR: &str = "POSTING_VALIDATION_ENGINE_URL";

/// Environment variable holding an optional bearer token.
pub const ENGINE_KEY_VAR: &str = "POSTING_VALIDATION_ENGINE_KEY";

#[derive(Debug, Serialize)]
struct EngineRequest<'a> {
    task: &'static str,
    content: &'a str,
    schema_hints: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct EngineResponse {
    result: serde_json::Value,
    #[serde(default)]
    confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldAnswer {
    Plain(String),
    Scored { value: String, confidence: f32 },
}

/// Inference engine reached over HTTP.
#[derive(Clone)]
pub struct HttpInferenceEngine {
    http_client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpInferenceEngine {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            endpoint: endpoint.into(),
            api_key: None,
        }
    }

    /// Create from `POSTING_VALIDATION_ENGINE_URL` (and optionally
    /// `POSTING_VALIDATION_ENGINE_KEY`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = std::env::var(ENGINE_URL_VAR).map_err(|_| ConfigError::Empty {
            field: ENGINE_URL_VAR,
        })?;
        if url::Url::parse(&endpoint).is_err() {
            return Err(ConfigError::InvalidEnv {
                var: ENGINE_URL_VAR.to_string(),
                value: endpoint,
            });
        }
        let mut engine = Self::new(endpoint);
        if let Ok(key) = std::env::var(ENGINE_KEY_VAR) {
            engine = engine.with_api_key(key);
        }
        Ok(engine)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Client-level timeout. The orchestrator enforces its own per-call
    /// timeout regardless.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        self.http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ConfigError::HttpClient)?;
        Ok(self)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, request: &EngineRequest<'_>) -> EngineResult<EngineResponse> {
        let start = Instant::now();
        let mut builder = self.http_client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, task = request.task, "Engine request failed");
            if e.is_timeout() {
                EngineError::Timeout {
                    elapsed: start.elapsed(),
                }
            } else {
                EngineError::unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, task = request.task, "Engine returned an error status");
            return Err(EngineError::unavailable(format!("HTTP {status}")));
        }

        let body: EngineResponse = response
            .json()
            .await
            .map_err(|e| EngineError::unavailable(format!("malformed engine response: {e}")))?;
        debug!(
            task = request.task,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Engine answered"
        );
        Ok(body)
    }
}

#[async_trait]
impl InferenceEngine for HttpInferenceEngine {
    async fn classify(&self, content: &str) -> EngineResult<EngineClassification> {
        let response = self
            .call(&EngineRequest {
                task: "classify",
                content,
                schema_hints: Vec::new(),
            })
            .await?;
        parse_classification(response)
    }

    async fn extract(&self, content: &str, hints: &[JobField]) -> EngineResult<Vec<EngineCandidate>> {
        let response = self
            .call(&EngineRequest {
                task: "extract",
                content,
                schema_hints: hints.iter().map(|f| f.as_str()).collect(),
            })
            .await?;
        parse_candidates(response)
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn parse_classification(response: EngineResponse) -> EngineResult<EngineClassification> {
    let category = response
        .result
        .as_str()
        .and_then(Category::parse)
        .ok_or_else(|| EngineError::unavailable("engine returned an unknown category"))?;
    let confidence = response
        .confidence
        .ok_or_else(|| EngineError::unavailable("engine omitted confidence"))?;
    Ok(EngineClassification::new(category, confidence))
}

fn parse_candidates(response: EngineResponse) -> EngineResult<Vec<EngineCandidate>> {
    let answers: BTreeMap<String, Option<FieldAnswer>> =
        serde_json::from_value(response.result)
            .map_err(|e| EngineError::unavailable(format!("malformed extraction result: {e}")))?;
    let default_confidence = response.confidence.unwrap_or(0.0);

    let candidates = answers
        .into_iter()
        .filter_map(|(name, answer)| {
            let field = JobField::parse(&name)?;
            match answer? {
                FieldAnswer::Plain(value) => Some(EngineCandidate::new(field, value, default_confidence)),
                FieldAnswer::Scored { value, confidence } => {
                    Some(EngineCandidate::new(field, value, confidence))
                }
            }
        })
        .collect();
    Ok(candidates)
}
