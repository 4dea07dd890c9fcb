use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::LedgerError;

/// Identifies one calendar month of a ledger as a `YYYYMM` ordinal.
///
/// The string form sorts lexically in chronological order, which is what the
/// durable store relies on; the typed form derives `Ord` on `(year, month)` so
/// both agree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "String", try_from = "String")]
pub struct PeriodOrdinal {
    year: i32,
    month: u32,
}

impl PeriodOrdinal {
    pub fn new(year: i32, month: u32) -> Result<Self, LedgerError> {
        if !(1..=12).contains(&month) {
            return Err(LedgerError::Invalid(format!(
                "month out of range: {month}"
            )));
        }
        if !(0..=9999).contains(&year) {
            return Err(LedgerError::Invalid(format!("year out of range: {year}")));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The month immediately before this one.
    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// The month immediately after this one.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Signed whole-month distance from `other` to `self`.
    pub fn months_since(&self, other: &PeriodOrdinal) -> i64 {
        (self.year as i64 - other.year as i64) * 12 + (self.month as i64 - other.month as i64)
    }
}

impl fmt::Display for PeriodOrdinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for PeriodOrdinal {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LedgerError::Invalid(format!("malformed period ordinal: {s}")));
        }
        let year: i32 = s[..4]
            .parse()
            .map_err(|_| LedgerError::Invalid(format!("malformed period ordinal: {s}")))?;
        let month: u32 = s[4..]
            .parse()
            .map_err(|_| LedgerError::Invalid(format!("malformed period ordinal: {s}")))?;
        Self::new(year, month)
    }
}

impl From<PeriodOrdinal> for String {
    fn from(ordinal: PeriodOrdinal) -> Self {
        ordinal.to_string()
    }
}

impl TryFrom<String> for PeriodOrdinal {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
