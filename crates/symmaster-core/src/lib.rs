//! Core contracts for symmaster, a point-in-time symbol master.
//!
//! This crate contains:
//! - Canonical domain models: natural keys, microsecond validity intervals,
//!   SCD2 dimension records, and update batches
//! - Deterministic identity hashing with collision detection
//! - The temporal diff engine producing closure/insertion write sets
//! - As-of resolution of `(natural key, event timestamp)` to symbol ids
//! - Batch validation with per-row error reporting
//!
//! Everything here is pure and storage-agnostic; the orchestration and
//! repository contract live in `symmaster-service`.

pub mod diff;
pub mod domain;
pub mod error;
pub mod identity;
pub mod resolve;
pub mod validate;

pub use diff::{DiffPlan, RecordClosure, TemporalDiffEngine};
pub use domain::{
    DimensionRecord, ExchangeId, ExchangeSymbol, NaturalKey, SymbolId, TimestampMicros,
    UpdateBatch, UpdateRow,
};
pub use error::{BatchRejected, HashCollisionError, RowError, ValidationError};
pub use identity::{check_collisions, IdentityHasher};
pub use resolve::AsOfResolver;
pub use validate::{validate_batch, CandidateRow};
