use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const MAX_COMPONENT_LEN: usize = 32;

fn check_component(field: &'static str, normalized: &str) -> Result<(), ValidationError> {
    let len = normalized.chars().count();
    if len > MAX_COMPONENT_LEN {
        return Err(ValidationError::KeyComponentTooLong {
            field,
            len,
            max: MAX_COMPONENT_LEN,
        });
    }

    if let Some(first) = normalized.chars().next() {
        if !first.is_ascii_alphabetic() {
            return Err(ValidationError::KeyComponentInvalidStart { field, ch: first });
        }
    }

    for (index, ch) in normalized.chars().enumerate() {
        let valid = ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' || ch == '_';
        if !valid {
            return Err(ValidationError::KeyComponentInvalidChar { field, ch, index });
        }
    }

    Ok(())
}

/// Normalized exchange identifier, e.g. `XNAS` or `BINANCE`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExchangeId(String);

impl ExchangeId {
    /// Parse and normalize an exchange id to uppercase.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyExchangeId);
        }

        let normalized = trimmed.to_ascii_uppercase();
        check_component("exchange_id", &normalized)?;
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Normalized exchange-local symbol/ticker, e.g. `AAPL` or `BTC-USD`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExchangeSymbol(String);

impl ExchangeSymbol {
    /// Parse and normalize a symbol to uppercase.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyExchangeSymbol);
        }

        let normalized = trimmed.to_ascii_uppercase();
        check_component("exchange_symbol", &normalized)?;
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! impl_component_conversions {
    ($ty:ident) => {
        impl Display for $ty {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl TryFrom<String> for $ty {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl TryFrom<&str> for $ty {
            type Error = ValidationError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }
    };
}

impl_component_conversions!(ExchangeId);
impl_component_conversions!(ExchangeSymbol);

/// Caller-meaningful identity of a listing: exchange plus exchange-local symbol.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub exchange_id: ExchangeId,
    pub exchange_symbol: ExchangeSymbol,
}

impl NaturalKey {
    pub fn new(exchange_id: ExchangeId, exchange_symbol: ExchangeSymbol) -> Self {
        Self {
            exchange_id,
            exchange_symbol,
        }
    }

    pub fn parse(exchange_id: &str, exchange_symbol: &str) -> Result<Self, ValidationError> {
        Ok(Self::new(
            ExchangeId::parse(exchange_id)?,
            ExchangeSymbol::parse(exchange_symbol)?,
        ))
    }
}

impl Display for NaturalKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.exchange_id, self.exchange_symbol)
    }
}
