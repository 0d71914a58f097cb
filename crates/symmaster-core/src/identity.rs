//! Deterministic symbol identity.
//!
//! The id for one version of a natural key is the first 8 bytes of a
//! SHA-256 digest over a length-framed encoding of
//! `(exchange_id, exchange_symbol, valid_from)`. The digest is stable
//! across processes and runs; no randomized hasher state is involved.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::domain::{DimensionRecord, NaturalKey, SymbolId, TimestampMicros};
use crate::error::HashCollisionError;

pub struct IdentityHasher;

impl IdentityHasher {
    /// Derive the stable symbol id for one version of a natural key.
    ///
    /// Components are length-framed so distinct splits of the same byte
    /// sequence cannot produce the same digest input.
    pub fn symbol_id(key: &NaturalKey, valid_from: TimestampMicros) -> SymbolId {
        let mut hasher = Sha256::new();

        let exchange = key.exchange_id.as_str().as_bytes();
        hasher.update((exchange.len() as u64).to_be_bytes());
        hasher.update(exchange);

        let symbol = key.exchange_symbol.as_str().as_bytes();
        hasher.update((symbol.len() as u64).to_be_bytes());
        hasher.update(symbol);

        hasher.update(valid_from.as_micros().to_be_bytes());

        let digest = hasher.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        SymbolId::from_u64(u64::from_be_bytes(prefix))
    }
}

/// Verify that no two distinct `(natural key, valid_from)` tuples across the
/// existing snapshot and the planned insertions share a symbol id.
///
/// A record re-planned with its own existing tuple is not a collision; only
/// distinct tuples mapping to one id are.
pub fn check_collisions(
    existing: &[DimensionRecord],
    planned: &[DimensionRecord],
) -> Result<(), HashCollisionError> {
    let mut seen: HashMap<SymbolId, (&NaturalKey, TimestampMicros)> = HashMap::new();

    for record in existing.iter().chain(planned.iter()) {
        match seen.entry(record.symbol_id) {
            Entry::Vacant(slot) => {
                slot.insert((&record.key, record.valid_from));
            }
            Entry::Occupied(slot) => {
                let (key, valid_from) = *slot.get();
                if key != &record.key || valid_from != record.valid_from {
                    return Err(HashCollisionError {
                        symbol_id: record.symbol_id,
                        first: format!("{key}@{}", valid_from.as_micros()),
                        second: format!("{}@{}", record.key, record.valid_from.as_micros()),
                    });
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(exchange: &str, symbol: &str) -> NaturalKey {
        NaturalKey::parse(exchange, symbol).expect("key")
    }

    #[test]
    fn same_inputs_always_yield_same_id() {
        let k = key("XNAS", "AAPL");
        let ts = TimestampMicros::from_micros(1_700_000_000_000_000);
        assert_eq!(
            IdentityHasher::symbol_id(&k, ts),
            IdentityHasher::symbol_id(&k, ts)
        );
    }

    #[test]
    fn known_tuple_yields_known_id() {
        // Pinned value; a change here breaks every persisted symbol id.
        let id = IdentityHasher::symbol_id(
            &key("XNAS", "AAPL"),
            TimestampMicros::from_micros(1_700_000_000_000_000),
        );
        assert_eq!(id.to_string(), "551ac429c4cae468");
    }

    #[test]
    fn id_depends_on_valid_from() {
        let k = key("XNAS", "AAPL");
        let a = IdentityHasher::symbol_id(&k, TimestampMicros::from_micros(100));
        let b = IdentityHasher::symbol_id(&k, TimestampMicros::from_micros(101));
        assert_ne!(a, b);
    }

    #[test]
    fn distinct_tuples_yield_distinct_ids() {
        let ts = TimestampMicros::from_micros(100);
        let a = IdentityHasher::symbol_id(&key("XNAS", "AAPL"), ts);
        let b = IdentityHasher::symbol_id(&key("XNYS", "AAPL"), ts);
        let c = IdentityHasher::symbol_id(&key("XNAS", "AAPLX"), ts);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn framing_separates_component_boundaries() {
        let ts = TimestampMicros::from_micros(100);
        let a = IdentityHasher::symbol_id(&key("AB", "CD"), ts);
        let b = IdentityHasher::symbol_id(&key("ABC", "D"), ts);
        assert_ne!(a, b);
    }

    #[test]
    fn collision_check_accepts_replans_of_the_same_tuple() {
        let k = key("XNAS", "AAPL");
        let ts = TimestampMicros::from_micros(100);
        let record = DimensionRecord::open(
            k.clone(),
            IdentityHasher::symbol_id(&k, ts),
            ts,
            json!({}),
        );
        check_collisions(&[record.clone()], &[record]).expect("same tuple is not a collision");
    }

    #[test]
    fn collision_check_rejects_distinct_tuples_with_one_id() {
        let forged = SymbolId::from_u64(42);
        let a = DimensionRecord::open(
            key("XNAS", "AAPL"),
            forged,
            TimestampMicros::from_micros(100),
            json!({}),
        );
        let b = DimensionRecord::open(
            key("XNYS", "MSFT"),
            forged,
            TimestampMicros::from_micros(200),
            json!({}),
        );
        let err = check_collisions(&[a], &[b]).expect_err("must collide");
        assert_eq!(err.symbol_id, forged);
    }
}
