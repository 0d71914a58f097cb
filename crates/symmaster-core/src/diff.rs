//! SCD2 temporal diff.
//!
//! Pure planner: given the authoritative snapshot for the batch's natural
//! keys and the validated candidates, compute which records to close and
//! which to insert. Applying closures then insertions preserves interval
//! non-overlap, gap-free chaining, and the single-current-record rule.

use std::collections::BTreeMap;

use crate::domain::{DimensionRecord, NaturalKey, SymbolId, TimestampMicros};
use crate::error::ValidationError;
use crate::identity::IdentityHasher;
use crate::validate::CandidateRow;

/// Instruction to close an existing record at a new exclusive upper bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordClosure {
    pub symbol_id: SymbolId,
    pub valid_until: TimestampMicros,
}

/// Disjoint write set produced by one diff computation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffPlan {
    pub closures: Vec<RecordClosure>,
    pub insertions: Vec<DimensionRecord>,
}

impl DiffPlan {
    pub fn is_empty(&self) -> bool {
        self.closures.is_empty() && self.insertions.is_empty()
    }

    /// Total rows the plan will touch when applied.
    pub fn row_count(&self) -> usize {
        self.closures.len() + self.insertions.len()
    }
}

pub struct TemporalDiffEngine;

impl TemporalDiffEngine {
    /// Compute the closure/insertion plan for a validated candidate set.
    ///
    /// The snapshot must contain the current and relevant historical records
    /// for every natural key present in `candidates`.
    pub fn compute(
        snapshot: &[DimensionRecord],
        candidates: &[CandidateRow],
    ) -> Result<DiffPlan, ValidationError> {
        let mut by_key: BTreeMap<&NaturalKey, Vec<&CandidateRow>> = BTreeMap::new();
        for candidate in candidates {
            by_key.entry(&candidate.key).or_default().push(candidate);
        }

        let mut plan = DiffPlan::default();
        for (key, mut rows) in by_key {
            rows.sort_by_key(|candidate| candidate.valid_from);
            merge_key(key, snapshot, &rows, &mut plan)?;
        }

        Ok(plan)
    }
}

fn merge_key(
    key: &NaturalKey,
    snapshot: &[DimensionRecord],
    sorted: &[&CandidateRow],
    plan: &mut DiffPlan,
) -> Result<(), ValidationError> {
    let current = snapshot.iter().find(|r| r.is_current && r.key == *key);
    let history: Vec<&DimensionRecord> = snapshot
        .iter()
        .filter(|r| !r.is_current && r.key == *key)
        .collect();

    // Candidates landing exactly on an existing record's valid_from are
    // either an idempotent no-op or an unresolvable tie against the table.
    let mut fresh: Vec<&CandidateRow> = Vec::with_capacity(sorted.len());
    for &candidate in sorted {
        let existing = current
            .filter(|r| r.valid_from == candidate.valid_from)
            .or_else(|| {
                history
                    .iter()
                    .copied()
                    .find(|r| r.valid_from == candidate.valid_from)
            });

        match existing {
            Some(record) if record.payload == candidate.payload => continue,
            Some(_) => {
                return Err(ValidationError::ConflictingDuplicate {
                    key: key.to_string(),
                    valid_from: candidate.valid_from.as_micros(),
                });
            }
            None => fresh.push(candidate),
        }
    }

    let (earlier, later): (Vec<&CandidateRow>, Vec<&CandidateRow>) = match current {
        Some(record) => fresh
            .into_iter()
            .partition(|candidate| candidate.valid_from < record.valid_from),
        None => (Vec::new(), fresh),
    };

    if !earlier.is_empty() {
        backfill_chain(key, snapshot, &history, &earlier, plan)?;
    }

    chain_forward(key, current, &history, &later, plan)
}

/// Insert closed records strictly before the current record, splicing up to
/// the next existing version. The service layer's stale gate blocks this
/// path unless the caller forces backdating.
fn backfill_chain(
    key: &NaturalKey,
    snapshot: &[DimensionRecord],
    history: &[&DimensionRecord],
    earlier: &[&CandidateRow],
    plan: &mut DiffPlan,
) -> Result<(), ValidationError> {
    let mut chain: Vec<&CandidateRow> = Vec::with_capacity(earlier.len());
    for &candidate in earlier {
        if chain
            .last()
            .is_some_and(|prev| prev.payload == candidate.payload)
        {
            continue;
        }
        chain.push(candidate);
    }

    let mut bounds: Vec<TimestampMicros> = snapshot
        .iter()
        .filter(|r| r.key == *key)
        .map(|r| r.valid_from)
        .collect();
    bounds.sort_unstable();

    let mut iter = chain.iter().peekable();
    while let Some(candidate) = iter.next() {
        let valid_until = match iter.peek() {
            Some(next) => next.valid_from,
            None => splice_bound(&bounds, candidate.valid_from)?,
        };
        check_declared_bound(key, candidate, valid_until)?;
        check_overlap(key, history, candidate.valid_from, valid_until)?;

        let symbol_id = IdentityHasher::symbol_id(key, candidate.valid_from);
        plan.insertions.push(DimensionRecord::closed(
            key.clone(),
            symbol_id,
            candidate.valid_from,
            valid_until,
            candidate.payload.clone(),
        ));
    }

    Ok(())
}

fn splice_bound(
    bounds: &[TimestampMicros],
    valid_from: TimestampMicros,
) -> Result<TimestampMicros, ValidationError> {
    // Backfill only happens below the current record's valid_from, so a
    // later existing bound always exists.
    bounds
        .iter()
        .copied()
        .find(|bound| *bound > valid_from)
        .ok_or(ValidationError::InvalidInterval {
            valid_from: valid_from.as_micros(),
            valid_until: valid_from.as_micros(),
        })
}

/// Merge the in-order candidates at or after the current record: close the
/// current record at the first distinct-payload candidate, chain the rest,
/// and leave the last one open (or closed, if it carries an explicit
/// `valid_until` retiring the key).
fn chain_forward(
    key: &NaturalKey,
    current: Option<&DimensionRecord>,
    history: &[&DimensionRecord],
    later: &[&CandidateRow],
    plan: &mut DiffPlan,
) -> Result<(), ValidationError> {
    let mut pending: Vec<&CandidateRow> = Vec::with_capacity(later.len());
    let mut tail_payload = current.map(|record| &record.payload);

    for &candidate in later {
        if tail_payload == Some(&candidate.payload) {
            continue;
        }
        pending.push(candidate);
        tail_payload = Some(&candidate.payload);
    }

    if pending.is_empty() {
        return Ok(());
    }

    if let Some(record) = current {
        plan.closures.push(RecordClosure {
            symbol_id: record.symbol_id,
            valid_until: pending[0].valid_from,
        });
    }

    let mut iter = pending.iter().peekable();
    while let Some(candidate) = iter.next() {
        let symbol_id = IdentityHasher::symbol_id(key, candidate.valid_from);

        let record = match iter.peek() {
            Some(next) => {
                check_declared_bound(key, candidate, next.valid_from)?;
                DimensionRecord::closed(
                    key.clone(),
                    symbol_id,
                    candidate.valid_from,
                    next.valid_from,
                    candidate.payload.clone(),
                )
            }
            None => match candidate.valid_until {
                Some(valid_until) => DimensionRecord::closed(
                    key.clone(),
                    symbol_id,
                    candidate.valid_from,
                    valid_until,
                    candidate.payload.clone(),
                ),
                None => DimensionRecord::open(
                    key.clone(),
                    symbol_id,
                    candidate.valid_from,
                    candidate.payload.clone(),
                ),
            },
        };

        check_overlap(key, history, record.valid_from, record.valid_until)?;
        plan.insertions.push(record);
    }

    Ok(())
}

/// A candidate followed by another version cannot end anywhere but at that
/// successor's `valid_from`. A declared bound that restates it is accepted;
/// one that disagrees is rejected rather than silently rewritten.
fn check_declared_bound(
    key: &NaturalKey,
    candidate: &CandidateRow,
    assigned: TimestampMicros,
) -> Result<(), ValidationError> {
    match candidate.valid_until {
        Some(declared) if declared != assigned => Err(ValidationError::ChainBoundConflict {
            key: key.to_string(),
            valid_from: candidate.valid_from.as_micros(),
            valid_until: declared.as_micros(),
            next_valid_from: assigned.as_micros(),
        }),
        _ => Ok(()),
    }
}

fn check_overlap(
    key: &NaturalKey,
    history: &[&DimensionRecord],
    valid_from: TimestampMicros,
    valid_until: TimestampMicros,
) -> Result<(), ValidationError> {
    let overlapping = history
        .iter()
        .any(|record| valid_from < record.valid_until && record.valid_from < valid_until);

    if overlapping {
        return Err(ValidationError::OverlapsHistory {
            key: key.to_string(),
            valid_from: valid_from.as_micros(),
        });
    }

    Ok(())
}
