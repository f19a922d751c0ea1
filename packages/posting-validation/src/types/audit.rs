//! Audit record - one per pipeline run, produced on every path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::types::classification::Category;
use crate::types::content::RawContent;
use crate::types::outcome::{OutcomeStatus, ValidationOutcome};

/// Pipeline state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Init,
    UrlCheck,
    Classify,
    Extract,
    QualityGate,
    Accepted,
    Warned,
    Rejected,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::UrlCheck => "URL_CHECK",
            Self::Classify => "CLASSIFY",
            Self::Extract => "EXTRACT",
            Self::QualityGate => "QUALITY_GATE",
            Self::Accepted => "ACCEPTED",
            Self::Warned => "WARNED",
            Self::Rejected => "REJECTED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Accepted | Self::Warned | Self::Rejected | Self::Failed
        )
    }

    /// Whether entering this state runs work (as opposed to INIT or a terminal).
    pub fn is_stage(&self) -> bool {
        matches!(
            self,
            Self::UrlCheck | Self::Classify | Self::Extract | Self::QualityGate
        )
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// A breaker state change caused by a run's engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitTransition {
    pub from: CircuitState,
    pub to: CircuitState,
    /// Which engine attempt of the run caused it (1-based).
    pub attempt: u32,
}

/// A timestamped state entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEntry {
    pub state: PipelineState,
    pub entered_at: DateTime<Utc>,
}

/// Audit record for one run.
///
/// Handed to the persistence collaborator; the core never stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub session_id: Uuid,
    pub url: String,
    /// SHA-256 of the raw body, hex encoded.
    pub content_digest: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Every state entered, in order.
    pub stages: Vec<StageEntry>,
    /// Work-performing stages that ran.
    pub stages_executed: Vec<PipelineState>,
    pub terminal_state: PipelineState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome_status: Option<OutcomeStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Attempts actually sent to the engine by this run.
    pub engine_calls_made: u32,
    /// Error codes of failed engine calls, in order.
    #[serde(default)]
    pub engine_failures: Vec<String>,
    /// Engine failures were absorbed by rule-only fallback.
    pub degraded: bool,
    /// Breaker state when the run finished.
    pub circuit_state: CircuitState,
    #[serde(default)]
    pub circuit_transitions: Vec<CircuitTransition>,
}

impl AuditRecord {
    /// Open a record for a run over `content`.
    pub fn begin(content: &RawContent, circuit_state: CircuitState) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::now_v7(),
            url: content.url.clone(),
            content_digest: content_digest(&content.body),
            started_at: now,
            finished_at: None,
            stages: vec![StageEntry {
                state: PipelineState::Init,
                entered_at: now,
            }],
            stages_executed: Vec::new(),
            terminal_state: PipelineState::Init,
            outcome_status: None,
            rejection_code: None,
            category: None,
            engine_calls_made: 0,
            engine_failures: Vec::new(),
            degraded: false,
            circuit_state,
            circuit_transitions: Vec::new(),
        }
    }

    /// Append a state entry.
    pub fn enter(&mut self, state: PipelineState) {
        self.stages.push(StageEntry {
            state,
            entered_at: Utc::now(),
        });
        if state.is_stage() {
            self.stages_executed.push(state);
        }
        self.terminal_state = state;
    }

    /// Close the record with the run's outcome.
    pub fn finish(&mut self, outcome: &ValidationOutcome) {
        self.outcome_status = Some(outcome.status);
        self.rejection_code = outcome
            .rejection_reason
            .as_ref()
            .map(|r| r.code().to_string());
        self.finished_at = Some(Utc::now());
    }

    pub fn executed(&self, state: PipelineState) -> bool {
        self.stages_executed.contains(&state)
    }

    /// The state path without timestamps.
    pub fn path(&self) -> Vec<PipelineState> {
        self.stages.iter().map(|s| s.state).collect()
    }
}

/// Hex SHA-256 of a body.
pub fn content_digest(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}
