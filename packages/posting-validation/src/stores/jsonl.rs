//! Append-only JSON lines sink.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::SinkError;
use crate::traits::sink::RunSink;
use crate::types::audit::AuditRecord;
use crate::types::outcome::ValidationOutcome;

#[derive(Serialize)]
struct Line<'a> {
    outcome: &'a ValidationOutcome,
    audit: &'a AuditRecord,
}

/// Appends `{"outcome": .., "audit": ..}` per run to a file.
pub struct JsonLinesSink {
    path: PathBuf,
    /// Serializes appends from concurrent runs.
    write_lock: Mutex<()>,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RunSink for JsonLinesSink {
    async fn record(
        &self,
        outcome: &ValidationOutcome,
        audit: &AuditRecord,
    ) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&Line { outcome, audit })?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| SinkError::Storage(Box::new(e)))?;
        file.write_all(&line)
            .await
            .map_err(|e| SinkError::Storage(Box::new(e)))?;
        file.flush()
            .await
            .map_err(|e| SinkError::Storage(Box::new(e)))?;
        Ok(())
    }
}
