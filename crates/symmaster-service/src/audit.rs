//! Structured per-run audit trail.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use symmaster_core::TimestampMicros;

/// Terminal state of one orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    FailedValidation,
    FailedStale,
    FailedCollision,
    FailedConflictExhausted,
    FailedRepository,
}

/// One append-only record per orchestration run, success or failure.
///
/// Field-per-metric so downstream tooling can aggregate run history without
/// parsing free text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub run_id: Uuid,
    pub recorded_at: String,
    pub outcome: RunOutcome,
    /// Write attempts made, including the successful one.
    pub attempts: u32,
    pub rows_submitted: usize,
    pub rows_read: usize,
    pub rows_written: usize,
    pub symbols_changed: usize,
    /// Earliest candidate `valid_from` in the processed batch.
    pub window_start: Option<TimestampMicros>,
    /// Latest candidate `valid_from` in the processed batch.
    pub window_end: Option<TimestampMicros>,
    /// Failure context; `None` on success.
    pub detail: Option<String>,
}

impl AuditRecord {
    pub fn recorded_now() -> String {
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink failure: {0}")]
    Sink(String),
}

/// Append-only audit writer.
pub trait AuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

impl<S: AuditSink + ?Sized> AuditSink for Arc<S> {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        (**self).record(record)
    }
}

impl<S: AuditSink + ?Sized> AuditSink for &S {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        (**self).record(record)
    }
}

/// Sink collecting records in memory, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads through a poisoned lock so assertions see what was recorded
    /// before a panicked writer, never an empty trail.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        self.records
            .lock()
            .map_err(|_| AuditError::Sink(String::from("audit lock poisoned")))?
            .push(record.clone());
        Ok(())
    }
}
