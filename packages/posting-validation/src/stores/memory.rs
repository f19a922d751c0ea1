//! In-memory run sink for testing and development.

use async_trait::async_trait;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::error::SinkError;
use crate::traits::sink::RunSink;
use crate::types::audit::AuditRecord;
use crate::types::outcome::ValidationOutcome;

/// One recorded run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRun {
    pub outcome: ValidationOutcome,
    pub audit: AuditRecord,
}

/// Keeps every recorded run in memory, in arrival order.
///
/// Data is lost on restart.
#[derive(Debug, Default)]
pub struct MemorySink {
    runs: RwLock<Vec<RecordedRun>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// All runs recorded so far.
    pub fn runs(&self) -> Vec<RecordedRun> {
        self.read().clone()
    }

    /// Look up a run by its audit session id.
    pub fn get(&self, session_id: Uuid) -> Option<RecordedRun> {
        self.read()
            .iter()
            .find(|r| r.audit.session_id == session_id)
            .cloned()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<RecordedRun>> {
        self.runs.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<RecordedRun>> {
        self.runs.write().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl RunSink for MemorySink {
    async fn record(
        &self,
        outcome: &ValidationOutcome,
        audit: &AuditRecord,
    ) -> Result<(), SinkError> {
        self.write().push(RecordedRun {
            outcome: outcome.clone(),
            audit: audit.clone(),
        });
        Ok(())
    }
}
