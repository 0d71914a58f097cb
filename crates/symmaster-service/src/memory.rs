//! In-memory reference repository.
//!
//! Executable statement of the [`TableRepository`] contract: a single
//! `Mutex`-guarded table with a monotonically increasing version. Writes
//! against a stale version report `Conflict` without mutating anything.

use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use symmaster_core::{DiffPlan, DimensionRecord, NaturalKey};

use crate::repository::{
    RepositoryError, TableRepository, TableSnapshot, VersionToken, WriteOutcome,
};

#[derive(Debug, Default)]
struct TableState {
    records: Vec<DimensionRecord>,
    version: u64,
}

#[derive(Debug, Default)]
pub struct InMemoryTable {
    state: Mutex<TableState>,
}

impl InMemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from pre-existing dimension state.
    pub fn seeded(records: Vec<DimensionRecord>) -> Self {
        Self {
            state: Mutex::new(TableState {
                records,
                version: 1,
            }),
        }
    }

    /// Full copy of the table, for assertions and resolver construction.
    ///
    /// Reads through a poisoned lock: assertions must see the real state
    /// even after a panicked writer, never an empty table.
    pub fn dump(&self) -> Vec<DimensionRecord> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .clone()
    }
}

impl TableRepository for InMemoryTable {
    fn read_current(&self, keys: &BTreeSet<NaturalKey>) -> Result<TableSnapshot, RepositoryError> {
        let state = self
            .state
            .lock()
            .map_err(|_| RepositoryError::Storage(String::from("table lock poisoned")))?;

        let records = state
            .records
            .iter()
            .filter(|record| keys.contains(&record.key))
            .cloned()
            .collect();

        Ok(TableSnapshot {
            records,
            version: VersionToken(state.version),
        })
    }

    fn write(
        &self,
        plan: &DiffPlan,
        expected: VersionToken,
    ) -> Result<WriteOutcome, RepositoryError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| RepositoryError::Storage(String::from("table lock poisoned")))?;

        if state.version != expected.0 {
            return Ok(WriteOutcome::Conflict);
        }

        // Verify every closure target before mutating anything.
        for closure in &plan.closures {
            if !state
                .records
                .iter()
                .any(|record| record.symbol_id == closure.symbol_id)
            {
                return Err(RepositoryError::UnknownClosureTarget {
                    symbol_id: closure.symbol_id.to_string(),
                });
            }
        }

        for closure in &plan.closures {
            for record in state
                .records
                .iter_mut()
                .filter(|record| record.symbol_id == closure.symbol_id)
            {
                record.valid_until = closure.valid_until;
                record.is_current = false;
            }
        }

        state.records.extend(plan.insertions.iter().cloned());
        state.version += 1;
        Ok(WriteOutcome::Committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use symmaster_core::{IdentityHasher, RecordClosure, TimestampMicros};

    fn key(symbol: &str) -> NaturalKey {
        NaturalKey::parse("XNAS", symbol).expect("key")
    }

    fn open_record(symbol: &str, valid_from: i64) -> DimensionRecord {
        let k = key(symbol);
        let ts = TimestampMicros::from_micros(valid_from);
        DimensionRecord::open(k.clone(), IdentityHasher::symbol_id(&k, ts), ts, json!({}))
    }

    fn keys_of(symbols: &[&str]) -> BTreeSet<NaturalKey> {
        symbols.iter().map(|s| key(s)).collect()
    }

    #[test]
    fn read_filters_to_requested_keys() {
        let table = InMemoryTable::seeded(vec![open_record("AAPL", 100), open_record("MSFT", 100)]);
        let snapshot = table.read_current(&keys_of(&["AAPL"])).expect("read");
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].key, key("AAPL"));
    }

    #[test]
    fn stale_version_reports_conflict_without_mutation() {
        let table = InMemoryTable::seeded(vec![open_record("AAPL", 100)]);
        let plan = DiffPlan {
            closures: Vec::new(),
            insertions: vec![open_record("MSFT", 100)],
        };

        let outcome = table.write(&plan, VersionToken(0)).expect("write");
        assert_eq!(outcome, WriteOutcome::Conflict);
        assert_eq!(table.dump().len(), 1);
    }

    #[test]
    fn committed_write_applies_closures_then_insertions_and_bumps_version() {
        let existing = open_record("AAPL", 100);
        let table = InMemoryTable::seeded(vec![existing.clone()]);
        let replacement = open_record("AAPL", 150);

        let plan = DiffPlan {
            closures: vec![RecordClosure {
                symbol_id: existing.symbol_id,
                valid_until: TimestampMicros::from_micros(150),
            }],
            insertions: vec![replacement],
        };

        let outcome = table.write(&plan, VersionToken(1)).expect("write");
        assert_eq!(outcome, WriteOutcome::Committed);

        let records = table.dump();
        assert_eq!(records.len(), 2);
        let closed = records.iter().find(|r| !r.is_current).expect("closed row");
        assert_eq!(closed.valid_until, TimestampMicros::from_micros(150));

        let snapshot = table.read_current(&keys_of(&["AAPL"])).expect("read");
        assert_eq!(snapshot.version, VersionToken(2));
    }

    #[test]
    fn dump_reads_through_a_poisoned_lock() {
        let table = InMemoryTable::seeded(vec![open_record("AAPL", 100)]);

        let poison = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = table.state.lock().expect("lock");
            panic!("writer died mid-update");
        }));
        assert!(poison.is_err());

        assert_eq!(table.dump().len(), 1);
    }

    #[test]
    fn closure_of_unknown_record_is_a_storage_error() {
        let table = InMemoryTable::new();
        let plan = DiffPlan {
            closures: vec![RecordClosure {
                symbol_id: open_record("AAPL", 100).symbol_id,
                valid_until: TimestampMicros::from_micros(150),
            }],
            insertions: Vec::new(),
        };

        let err = table.write(&plan, VersionToken(0)).expect_err("must fail");
        assert!(matches!(err, RepositoryError::UnknownClosureTarget { .. }));
    }
}
