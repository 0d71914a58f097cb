//! Batch validation and deduplication.
//!
//! Every row is checked independently so a rejection reports all offending
//! rows at once. Exact duplicates (same key, same `valid_from`, same
//! payload) collapse silently; duplicates that disagree on payload are an
//! unresolvable tie and fail the whole batch.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde_json::Value;

use crate::domain::{NaturalKey, TimestampMicros, UpdateBatch, UpdateRow};
use crate::error::{BatchRejected, RowError, ValidationError};

/// One validated, deduplicated candidate row.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRow {
    pub key: NaturalKey,
    pub valid_from: TimestampMicros,
    pub valid_until: Option<TimestampMicros>,
    pub payload: Value,
}

/// Validate and deduplicate a submitted batch.
///
/// Returns candidates sorted by `(key, valid_from)`, or every per-row
/// failure found.
pub fn validate_batch(batch: &UpdateBatch) -> Result<Vec<CandidateRow>, BatchRejected> {
    let mut errors = Vec::new();
    let mut deduped: BTreeMap<(NaturalKey, TimestampMicros), CandidateRow> = BTreeMap::new();

    for (row, input) in batch.rows.iter().enumerate() {
        let candidate = match validate_row(input) {
            Ok(candidate) => candidate,
            Err(error) => {
                errors.push(RowError { row, error });
                continue;
            }
        };

        match deduped.entry((candidate.key.clone(), candidate.valid_from)) {
            Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
            Entry::Occupied(slot) => {
                let kept = slot.get();
                if kept.payload != candidate.payload || kept.valid_until != candidate.valid_until {
                    errors.push(RowError {
                        row,
                        error: ValidationError::ConflictingDuplicate {
                            key: candidate.key.to_string(),
                            valid_from: candidate.valid_from.as_micros(),
                        },
                    });
                }
                // Exact duplicate: dropped silently.
            }
        }
    }

    if !errors.is_empty() {
        return Err(BatchRejected { errors });
    }

    Ok(deduped.into_values().collect())
}

fn validate_row(row: &UpdateRow) -> Result<CandidateRow, ValidationError> {
    let key = NaturalKey::parse(&row.exchange_id, &row.exchange_symbol)?;

    if row.valid_from.is_open() {
        return Err(ValidationError::InvalidInterval {
            valid_from: row.valid_from.as_micros(),
            valid_until: TimestampMicros::OPEN_END.as_micros(),
        });
    }

    if let Some(valid_until) = row.valid_until {
        if row.valid_from >= valid_until {
            return Err(ValidationError::InvalidInterval {
                valid_from: row.valid_from.as_micros(),
                valid_until: valid_until.as_micros(),
            });
        }
    }

    if !row.payload.is_object() {
        return Err(ValidationError::PayloadNotObject);
    }

    Ok(CandidateRow {
        key,
        valid_from: row.valid_from,
        valid_until: row.valid_until,
        payload: row.payload.clone(),
    })
}
