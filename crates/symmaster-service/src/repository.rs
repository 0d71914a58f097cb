//! Storage contract consumed by the orchestrator.
//!
//! The core never talks to a concrete engine; it reads a versioned snapshot
//! and submits the diff plan conditionally against that version. A write
//! against a superseded version must report `Conflict` so the caller can
//! re-read and recompute.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use symmaster_core::{DiffPlan, DimensionRecord, NaturalKey};

/// Opaque snapshot version used for optimistic, conditional writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionToken(pub u64);

/// Current plus relevant historical records for a set of natural keys,
/// read atomically at one version.
#[derive(Debug, Clone)]
pub struct TableSnapshot {
    pub records: Vec<DimensionRecord>,
    pub version: VersionToken,
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Committed,
    /// Someone else wrote since the snapshot was read.
    Conflict,
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage failure: {0}")]
    Storage(String),

    #[error("closure targets unknown record {symbol_id}")]
    UnknownClosureTarget { symbol_id: String },
}

/// Transactional dimension-table storage.
pub trait TableRepository {
    /// Read the current and relevant historical records for `keys` as one
    /// internally consistent snapshot.
    fn read_current(&self, keys: &BTreeSet<NaturalKey>) -> Result<TableSnapshot, RepositoryError>;

    /// Apply closures then insertions as one logical transaction, only if
    /// the table is still at `expected`.
    fn write(&self, plan: &DiffPlan, expected: VersionToken)
        -> Result<WriteOutcome, RepositoryError>;
}

impl<R: TableRepository + ?Sized> TableRepository for Arc<R> {
    fn read_current(&self, keys: &BTreeSet<NaturalKey>) -> Result<TableSnapshot, RepositoryError> {
        (**self).read_current(keys)
    }

    fn write(
        &self,
        plan: &DiffPlan,
        expected: VersionToken,
    ) -> Result<WriteOutcome, RepositoryError> {
        (**self).write(plan, expected)
    }
}

impl<R: TableRepository + ?Sized> TableRepository for &R {
    fn read_current(&self, keys: &BTreeSet<NaturalKey>) -> Result<TableSnapshot, RepositoryError> {
        (**self).read_current(keys)
    }

    fn write(
        &self,
        plan: &DiffPlan,
        expected: VersionToken,
    ) -> Result<WriteOutcome, RepositoryError> {
        (**self).write(plan, expected)
    }
}
