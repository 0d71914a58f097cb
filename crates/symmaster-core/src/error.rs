use thiserror::Error;

use crate::domain::SymbolId;

/// Validation and temporal-consistency errors exposed by `symmaster-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("exchange id cannot be empty")]
    EmptyExchangeId,
    #[error("exchange symbol cannot be empty")]
    EmptyExchangeSymbol,
    #[error("{field} length {len} exceeds max {max}")]
    KeyComponentTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("{field} must start with an ASCII letter: '{ch}'")]
    KeyComponentInvalidStart { field: &'static str, ch: char },
    #[error("{field} contains invalid character '{ch}' at index {index}")]
    KeyComponentInvalidChar {
        field: &'static str,
        ch: char,
        index: usize,
    },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("valid_from {valid_from} must precede valid_until {valid_until}")]
    InvalidInterval { valid_from: i64, valid_until: i64 },

    #[error("payload must be a JSON object")]
    PayloadNotObject,

    #[error("conflicting duplicate for {key} at {valid_from}: same timestamp, different payload")]
    ConflictingDuplicate { key: String, valid_from: i64 },

    #[error(
        "valid_until {valid_until} for {key} at {valid_from} disagrees with the next version at {next_valid_from}"
    )]
    ChainBoundConflict {
        key: String,
        valid_from: i64,
        valid_until: i64,
        next_valid_from: i64,
    },

    #[error("candidate for {key} at {valid_from} overlaps closed history")]
    OverlapsHistory { key: String, valid_from: i64 },
}

/// A validation failure attributed to one row of the submitted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// Zero-based index into the submitted batch.
    pub row: usize,
    pub error: ValidationError,
}

/// Aggregate rejection carrying every offending row, so callers can fix
/// all bad input in one pass.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("batch rejected with {} invalid row(s)", .errors.len())]
pub struct BatchRejected {
    pub errors: Vec<RowError>,
}

/// Two distinct natural-key versions produced the same symbol id.
///
/// This is fatal: the table must never silently merge identities.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("symbol id collision on {symbol_id}: {first} vs {second}")]
pub struct HashCollisionError {
    pub symbol_id: SymbolId,
    pub first: String,
    pub second: String,
}
