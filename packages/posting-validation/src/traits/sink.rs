//! Persistence collaborator.

use async_trait::async_trait;

use crate::error::SinkError;
use crate::types::audit::AuditRecord;
use crate::types::outcome::ValidationOutcome;

/// Receives the artifacts of each finished run.
///
/// The core never writes storage itself; callers plug in a sink.
#[async_trait]
pub trait RunSink: Send + Sync {
    /// Record one run's outcome and audit record.
    async fn record(&self, outcome: &ValidationOutcome, audit: &AuditRecord)
        -> Result<(), SinkError>;
}
