//! The validate → deduplicate → diff → write → audit lifecycle.
//!
//! Concurrency safety comes entirely from the repository's conditional
//! write: read a versioned snapshot, compute the diff, attempt the write,
//! and on conflict re-read and recompute. The loop is explicitly bounded;
//! past the bound the run fails with `ConflictExhausted` and the caller
//! decides whether to resubmit.

use std::collections::BTreeSet;
use std::thread;

use uuid::Uuid;

use symmaster_core::{
    check_collisions, validate_batch, CandidateRow, DimensionRecord, NaturalKey,
    TemporalDiffEngine, TimestampMicros, UpdateBatch,
};

use crate::audit::{AuditRecord, AuditSink, RunOutcome};
use crate::error::ServiceError;
use crate::repository::{TableRepository, WriteOutcome};
use crate::retry::RetryConfig;

#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    pub retry: RetryConfig,
    /// Permit candidates that predate a key's current record. Off by
    /// default: late-arriving feeds must not silently backdate history.
    pub allow_backdate: bool,
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub audit: AuditRecord,
    /// False when the batch reduced to an idempotent no-op.
    pub plan_applied: bool,
}

#[derive(Debug, Default)]
struct RunStats {
    attempts: u32,
    rows_submitted: usize,
    rows_read: usize,
    rows_written: usize,
    symbols_changed: usize,
    window_start: Option<TimestampMicros>,
    window_end: Option<TimestampMicros>,
}

/// Applies update batches to the dimension table.
pub struct ServiceOrchestrator<R, A> {
    repository: R,
    audit_sink: A,
    config: OrchestratorConfig,
}

impl<R: TableRepository, A: AuditSink> ServiceOrchestrator<R, A> {
    pub fn new(repository: R, audit_sink: A) -> Self {
        Self::with_config(repository, audit_sink, OrchestratorConfig::default())
    }

    pub fn with_config(repository: R, audit_sink: A, config: OrchestratorConfig) -> Self {
        Self {
            repository,
            audit_sink,
            config,
        }
    }

    /// Run one batch to a terminal state.
    ///
    /// Every run, including failed ones, emits exactly one audit record.
    /// Validation and stale failures are detected before any write attempt
    /// and leave no partial state.
    pub fn apply(&self, batch: UpdateBatch) -> Result<RunReport, ServiceError> {
        let mut stats = RunStats {
            rows_submitted: batch.len(),
            ..RunStats::default()
        };

        let result = self.execute(&batch, &mut stats);
        let (outcome, detail) = match &result {
            Ok(_) => (RunOutcome::Succeeded, None),
            Err(err) => (outcome_of(err), Some(err.to_string())),
        };

        let audit = AuditRecord {
            run_id: Uuid::new_v4(),
            recorded_at: AuditRecord::recorded_now(),
            outcome,
            attempts: stats.attempts,
            rows_submitted: stats.rows_submitted,
            rows_read: stats.rows_read,
            rows_written: stats.rows_written,
            symbols_changed: stats.symbols_changed,
            window_start: stats.window_start,
            window_end: stats.window_end,
            detail,
        };

        match result {
            Ok(plan_applied) => {
                self.audit_sink.record(&audit)?;
                Ok(RunReport {
                    audit,
                    plan_applied,
                })
            }
            Err(err) => {
                // The original failure takes precedence over a sink failure.
                let _ = self.audit_sink.record(&audit);
                Err(err)
            }
        }
    }

    fn execute(&self, batch: &UpdateBatch, stats: &mut RunStats) -> Result<bool, ServiceError> {
        let candidates = validate_batch(batch)?;
        if candidates.is_empty() {
            return Ok(false);
        }

        stats.window_start = candidates.iter().map(|c| c.valid_from).min();
        stats.window_end = candidates.iter().map(|c| c.valid_from).max();

        let keys: BTreeSet<NaturalKey> = candidates.iter().map(|c| c.key.clone()).collect();
        let max_attempts = self.config.retry.max_attempts.max(1);

        for attempt in 0..max_attempts {
            stats.attempts = attempt + 1;

            let snapshot = self.repository.read_current(&keys)?;
            stats.rows_read = snapshot.records.len();

            self.check_stale(&snapshot.records, &candidates)?;

            let plan = TemporalDiffEngine::compute(&snapshot.records, &candidates)?;
            if plan.is_empty() {
                // Idempotent no-op: the table already reflects the batch.
                return Ok(false);
            }

            check_collisions(&snapshot.records, &plan.insertions)?;

            match self.repository.write(&plan, snapshot.version)? {
                WriteOutcome::Committed => {
                    stats.rows_written = plan.row_count();
                    stats.symbols_changed = plan
                        .insertions
                        .iter()
                        .map(|record| &record.key)
                        .collect::<BTreeSet<_>>()
                        .len();
                    return Ok(true);
                }
                WriteOutcome::Conflict => {
                    if attempt + 1 < max_attempts {
                        thread::sleep(self.config.retry.delay_for_attempt(attempt));
                    }
                }
            }
        }

        Err(ServiceError::ConflictExhausted {
            attempts: max_attempts,
        })
    }

    /// Reject batches whose earliest candidate predates a key's current
    /// record, unless backdating is explicitly allowed.
    fn check_stale(
        &self,
        snapshot: &[DimensionRecord],
        candidates: &[CandidateRow],
    ) -> Result<(), ServiceError> {
        if self.config.allow_backdate {
            return Ok(());
        }

        for record in snapshot.iter().filter(|record| record.is_current) {
            // Candidates the table already reflects are exempt: resubmitting
            // an applied batch stays idempotent instead of tripping the gate.
            let earliest = candidates
                .iter()
                .filter(|candidate| candidate.key == record.key)
                .filter(|candidate| !already_applied(snapshot, candidate))
                .map(|candidate| candidate.valid_from)
                .min();

            if let Some(earliest) = earliest {
                if earliest < record.valid_from {
                    return Err(ServiceError::StaleUpdate {
                        key: record.key.to_string(),
                        submitted: earliest.as_micros(),
                        current: record.valid_from.as_micros(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn already_applied(snapshot: &[DimensionRecord], candidate: &CandidateRow) -> bool {
    snapshot.iter().any(|record| {
        record.key == candidate.key
            && record.valid_from == candidate.valid_from
            && record.payload == candidate.payload
    })
}

fn outcome_of(err: &ServiceError) -> RunOutcome {
    match err {
        ServiceError::Validation(_) | ServiceError::Invalid(_) => RunOutcome::FailedValidation,
        ServiceError::StaleUpdate { .. } => RunOutcome::FailedStale,
        ServiceError::Collision(_) => RunOutcome::FailedCollision,
        ServiceError::ConflictExhausted { .. } => RunOutcome::FailedConflictExhausted,
        ServiceError::Repository(_) | ServiceError::Audit(_) => RunOutcome::FailedRepository,
    }
}
