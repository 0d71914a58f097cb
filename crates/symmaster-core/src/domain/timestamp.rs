use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use crate::error::ValidationError;

/// Microseconds since the Unix epoch.
///
/// `OPEN_END` is the sentinel upper bound of a still-current record; every
/// validity interval is `[valid_from, valid_until)` with an exclusive upper
/// bound.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TimestampMicros(i64);

impl TimestampMicros {
    /// Sentinel upper bound denoting an open/current record.
    pub const OPEN_END: Self = Self(i64::MAX);

    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    pub const fn as_micros(self) -> i64 {
        self.0
    }

    pub const fn is_open(self) -> bool {
        self.0 == i64::MAX
    }

    /// Parse an RFC3339 instant, rejecting anything not expressed in UTC.
    pub fn from_rfc3339(input: &str) -> Result<Self, ValidationError> {
        let parsed = OffsetDateTime::parse(input, &Rfc3339).map_err(|_| {
            ValidationError::TimestampNotUtc {
                value: input.to_owned(),
            }
        })?;

        if parsed.offset() != UtcOffset::UTC {
            return Err(ValidationError::TimestampNotUtc {
                value: input.to_owned(),
            });
        }

        Ok(Self((parsed.unix_timestamp_nanos() / 1_000) as i64))
    }

    /// Render as RFC3339; the open sentinel renders as `open`.
    pub fn format_rfc3339(self) -> String {
        if self.is_open() {
            return String::from("open");
        }

        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.0) * 1_000)
            .ok()
            .and_then(|dt| dt.format(&Rfc3339).ok())
            .unwrap_or_else(|| self.0.to_string())
    }
}

impl Display for TimestampMicros {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}
