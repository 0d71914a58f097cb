pub mod key;
pub mod record;
pub mod timestamp;

pub use key::{ExchangeId, ExchangeSymbol, NaturalKey};
pub use record::{DimensionRecord, SymbolId, UpdateBatch, UpdateRow};
pub use timestamp::TimestampMicros;
