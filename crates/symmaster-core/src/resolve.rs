//! Point-in-time resolution of natural keys to symbol ids.

use std::collections::HashMap;

use crate::domain::{DimensionRecord, NaturalKey, SymbolId, TimestampMicros};

#[derive(Debug, Clone, Copy)]
struct IntervalEntry {
    valid_from: TimestampMicros,
    valid_until: TimestampMicros,
    symbol_id: SymbolId,
}

/// Read-only as-of index over a dimension snapshot.
///
/// Built once per snapshot; queries never see a mix of snapshots. A miss is
/// a normal outcome (`None`), never a stale or approximate match.
#[derive(Debug, Default)]
pub struct AsOfResolver {
    index: HashMap<NaturalKey, Vec<IntervalEntry>>,
}

impl AsOfResolver {
    pub fn new(records: Vec<DimensionRecord>) -> Self {
        let mut index: HashMap<NaturalKey, Vec<IntervalEntry>> = HashMap::new();
        for record in records {
            index.entry(record.key).or_default().push(IntervalEntry {
                valid_from: record.valid_from,
                valid_until: record.valid_until,
                symbol_id: record.symbol_id,
            });
        }
        for entries in index.values_mut() {
            entries.sort_by_key(|entry| entry.valid_from);
        }
        Self { index }
    }

    /// Resolve the symbol id valid at `event_ts`.
    ///
    /// Lower bound inclusive, upper bound exclusive: an event at exactly
    /// `valid_from` resolves to the record starting there.
    pub fn resolve(&self, key: &NaturalKey, event_ts: TimestampMicros) -> Option<SymbolId> {
        let entries = self.index.get(key)?;
        let idx = entries.partition_point(|entry| entry.valid_from <= event_ts);
        if idx == 0 {
            return None;
        }
        let entry = &entries[idx - 1];
        (event_ts < entry.valid_until).then_some(entry.symbol_id)
    }

    /// Resolve a batch of `(key, event_ts)` rows, preserving input order.
    ///
    /// Semantically identical to calling [`resolve`](Self::resolve) per row;
    /// implemented as a sort plus one linear merge per key rather than a
    /// binary search per row.
    pub fn resolve_many(
        &self,
        rows: &[(NaturalKey, TimestampMicros)],
    ) -> Vec<Option<SymbolId>> {
        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.sort_by(|&a, &b| rows[a].cmp(&rows[b]));

        let mut resolved = vec![None; rows.len()];
        let mut active: Option<&NaturalKey> = None;
        let mut pos = 0usize;

        for i in order {
            let (key, event_ts) = &rows[i];
            if active != Some(key) {
                active = Some(key);
                pos = 0;
            }

            let Some(entries) = self.index.get(key) else {
                continue;
            };

            while pos < entries.len() && entries[pos].valid_from <= *event_ts {
                pos += 1;
            }

            if pos > 0 {
                let entry = &entries[pos - 1];
                if *event_ts < entry.valid_until {
                    resolved[i] = Some(entry.symbol_id);
                }
            }
        }

        resolved
    }
}
