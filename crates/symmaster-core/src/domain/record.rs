use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::domain::key::NaturalKey;
use crate::domain::timestamp::TimestampMicros;

/// Stable derived identity for one version of a natural key.
///
/// Assigned once by the identity hasher and never recomputed for a stored
/// record; rendered as 16 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(u64);

impl SymbolId {
    pub const fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for SymbolId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0.to_be_bytes()))
    }
}

impl Serialize for SymbolId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SymbolId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        u64::from_str_radix(&value, 16)
            .map(Self)
            .map_err(|_| D::Error::custom(format!("invalid symbol id '{value}'")))
    }
}

/// One version of a listing's metadata, valid over `[valid_from, valid_until)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionRecord {
    pub key: NaturalKey,
    pub symbol_id: SymbolId,
    pub valid_from: TimestampMicros,
    pub valid_until: TimestampMicros,
    pub is_current: bool,
    /// Descriptive attributes (tick size, contract type, ...); opaque to the core.
    pub payload: Value,
}

impl DimensionRecord {
    /// A still-current record with the open upper bound.
    pub fn open(
        key: NaturalKey,
        symbol_id: SymbolId,
        valid_from: TimestampMicros,
        payload: Value,
    ) -> Self {
        Self {
            key,
            symbol_id,
            valid_from,
            valid_until: TimestampMicros::OPEN_END,
            is_current: true,
            payload,
        }
    }

    /// A closed historical record.
    pub fn closed(
        key: NaturalKey,
        symbol_id: SymbolId,
        valid_from: TimestampMicros,
        valid_until: TimestampMicros,
        payload: Value,
    ) -> Self {
        Self {
            key,
            symbol_id,
            valid_from,
            valid_until,
            is_current: false,
            payload,
        }
    }

    /// Half-open interval membership: lower bound inclusive, upper exclusive.
    pub fn interval_contains(&self, ts: TimestampMicros) -> bool {
        self.valid_from <= ts && ts < self.valid_until
    }
}

/// Raw caller-submitted update row; validated and deduplicated before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRow {
    pub exchange_id: String,
    pub exchange_symbol: String,
    pub valid_from: TimestampMicros,
    /// Explicit upper bound; supplying one on the last candidate of a chain
    /// retires the key instead of leaving it current.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<TimestampMicros>,
    pub payload: Value,
}

/// Single-use batch of candidate updates; consumed by one orchestration run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateBatch {
    pub rows: Vec<UpdateRow>,
}

impl UpdateBatch {
    pub fn new(rows: Vec<UpdateRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
