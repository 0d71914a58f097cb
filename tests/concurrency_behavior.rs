//! Behavior tests for the optimistic write loop: convergence under injected
//! conflicts, bounded exhaustion, and audit coverage of failures.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::json;
use symmaster_service::{
    RepositoryError, ServiceError, TableRepository, TableSnapshot, VersionToken, WriteOutcome,
};
use symmaster_core::DiffPlan;
use symmaster_tests::*;

/// Repository wrapper reporting `Conflict` for the first N write attempts,
/// then delegating to the real table.
struct ConflictingTable {
    inner: InMemoryTable,
    remaining: AtomicU32,
}

impl ConflictingTable {
    fn new(conflicts: u32) -> Self {
        Self {
            inner: InMemoryTable::new(),
            remaining: AtomicU32::new(conflicts),
        }
    }
}

impl TableRepository for ConflictingTable {
    fn read_current(
        &self,
        keys: &BTreeSet<NaturalKey>,
    ) -> Result<TableSnapshot, RepositoryError> {
        self.inner.read_current(keys)
    }

    fn write(
        &self,
        plan: &DiffPlan,
        expected: VersionToken,
    ) -> Result<WriteOutcome, RepositoryError> {
        if self.remaining.load(Ordering::SeqCst) > 0 {
            self.remaining.fetch_sub(1, Ordering::SeqCst);
            return Ok(WriteOutcome::Conflict);
        }
        self.inner.write(plan, expected)
    }
}

fn fast_retry(max_attempts: u32) -> OrchestratorConfig {
    OrchestratorConfig {
        retry: RetryConfig::fixed(Duration::from_millis(1), max_attempts),
        allow_backdate: false,
    }
}

// =============================================================================
// Convergence
// =============================================================================

#[test]
fn when_conflicts_stop_before_the_bound_the_run_converges() {
    // Given: a repository that conflicts on the first 2 write attempts
    let table = Arc::new(ConflictingTable::new(2));
    let sink = Arc::new(MemoryAuditSink::new());
    let orchestrator =
        ServiceOrchestrator::with_config(Arc::clone(&table), Arc::clone(&sink), fast_retry(4));

    // When: a batch is applied
    let report = orchestrator
        .apply(UpdateBatch::new(vec![row("AAPL", 100, json!({"v": 1}))]))
        .expect("run should converge");

    // Then: the third attempt commits and the audit counts all attempts
    assert!(report.plan_applied);
    assert_eq!(report.audit.attempts, 3);
    assert_eq!(report.audit.outcome, RunOutcome::Succeeded);
    assert_eq!(table.inner.dump().len(), 1);
}

#[test]
fn when_a_concurrent_writer_lands_first_the_rerun_diffs_fresh_state() {
    // Given: a table another writer already advanced
    let table = Arc::new(InMemoryTable::new());
    let writer_a = ServiceOrchestrator::new(Arc::clone(&table), MemoryAuditSink::new());
    let writer_b = ServiceOrchestrator::new(Arc::clone(&table), MemoryAuditSink::new());

    writer_a
        .apply(UpdateBatch::new(vec![row("AAPL", 100, json!({"v": 1}))]))
        .expect("writer a");

    // When: a second writer supersedes the same key
    writer_b
        .apply(UpdateBatch::new(vec![row("AAPL", 150, json!({"v": 2}))]))
        .expect("writer b");

    // Then: both versions are present and the invariants hold
    let records = table.dump();
    assert_eq!(records.len(), 2);
    assert_interval_invariants(&records);
}

// =============================================================================
// Exhaustion
// =============================================================================

#[test]
fn when_conflicts_persist_past_the_bound_the_run_fails_deterministically() {
    // Given: a repository that conflicts on every attempt
    let table = Arc::new(ConflictingTable::new(u32::MAX));
    let sink = Arc::new(MemoryAuditSink::new());
    let orchestrator =
        ServiceOrchestrator::with_config(Arc::clone(&table), Arc::clone(&sink), fast_retry(3));

    // When: a batch is applied
    let err = orchestrator
        .apply(UpdateBatch::new(vec![row("AAPL", 100, json!({"v": 1}))]))
        .expect_err("must exhaust");

    // Then: the failure reports the bound and nothing was written
    assert!(matches!(err, ServiceError::ConflictExhausted { attempts: 3 }));
    assert!(table.inner.dump().is_empty());

    // And: the failed run still produced a structured audit record
    let audits = sink.records();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].outcome, RunOutcome::FailedConflictExhausted);
    assert_eq!(audits[0].attempts, 3);
    assert_eq!(audits[0].rows_written, 0);
    assert!(audits[0].detail.as_deref().unwrap_or("").contains("3"));
}
