//! Calendar month keys used by the monthly download roll-up.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// A calendar month, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Create a month key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMonth`] if `month` is not in `1..=12` or the
    /// year cannot be written with four digits.
    pub fn new(year: i32, month: u32) -> Result<Self, Error> {
        if !(1..=12).contains(&month) || !(0..=9999).contains(&year) {
            return Err(Error::InvalidMonth(format!("{year}-{month:02}")));
        }
        Ok(Self { year, month })
    }

    /// The month containing `now`.
    #[must_use]
    pub fn of(now: DateTime<Utc>) -> Self {
        Self {
            year: now.year(),
            month: now.month(),
        }
    }

    /// The current UTC month.
    #[must_use]
    pub fn current() -> Self {
        Self::of(Utc::now())
    }

    /// The month before this one.
    #[must_use]
    pub fn previous(self) -> Self {
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

    /// Year component.
    #[must_use]
    pub fn year(self) -> i32 {
        self.year
    }

    /// Month component, 1-based.
    #[must_use]
    pub fn month(self) -> u32 {
        self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidMonth(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_display_pads() {
        let month = YearMonth::new(2024, 3).unwrap();
        assert_eq!(month.to_string(), "2024-03");
    }

    #[test]
    fn test_parse() {
        let month: YearMonth = "2025-11".parse().unwrap();
        assert_eq!(month.year(), 2025);
        assert_eq!(month.month(), 11);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for raw in ["2025-13", "2025-00", "2025-1", "25-01", "2025/01", "", "abcd-ef"] {
            assert!(raw.parse::<YearMonth>().is_err(), "accepted {raw}");
        }
    }

    #[test]
    fn test_previous_wraps_year() {
        let jan: YearMonth = "2025-01".parse().unwrap();
        assert_eq!(jan.previous().to_string(), "2024-12");

        let jul: YearMonth = "2025-07".parse().unwrap();
        assert_eq!(jul.previous().to_string(), "2025-06");
    }

    #[test]
    fn test_of_datetime() {
        let now = Utc.with_ymd_and_hms(2026, 2, 28, 23, 59, 59).unwrap();
        assert_eq!(YearMonth::of(now).to_string(), "2026-02");
    }

    #[test]
    fn test_ordering_follows_calendar() {
        let a: YearMonth = "2024-12".parse().unwrap();
        let b: YearMonth = "2025-01".parse().unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_serde_as_string() {
        let month: YearMonth = "2024-05".parse().unwrap();
        let json = serde_json::to_string(&month).unwrap();
        assert_eq!(json, "\"2024-05\"");

        let back: YearMonth = serde_json::from_str(&json).unwrap();
        assert_eq!(back, month);
        assert!(serde_json::from_str::<YearMonth>("\"2024-5\"").is_err());
    }
}
