//! `YYYYMMDD` day keys.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// A calendar day encoded as the integer `YYYYMMDD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateKey(u32);

impl DateKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.year() as u32 * 10_000 + date.month() * 100 + date.day())
    }

    /// Today in local time.
    pub fn today() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    pub fn to_date(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(
            (self.0 / 10_000) as i32,
            (self.0 / 100) % 100,
            self.0 % 100,
        )
    }

    /// The key `days` calendar days earlier.
    pub fn minus_days(self, days: u32) -> Option<Self> {
        self.to_date()
            .and_then(|d| d.checked_sub_days(Days::new(u64::from(days))))
            .map(Self::from_date)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08}", self.0)
    }
}

impl FromStr for DateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y%m%d")
            .map(Self::from_date)
            .map_err(|_| format!("invalid date '{}' (expected YYYYMMDD)", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_date() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(DateKey::from_date(d).to_string(), "20250307");
    }

    #[test]
    fn test_minus_days_crosses_month_and_year() {
        let key: DateKey = "20250103".parse().unwrap();
        assert_eq!(key.minus_days(7).unwrap().to_string(), "20241227");

        let key: DateKey = "20240301".parse().unwrap();
        assert_eq!(key.minus_days(1).unwrap().to_string(), "20240229");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("2025-01-03".parse::<DateKey>().is_err());
        assert!("20251340".parse::<DateKey>().is_err());
        assert!("".parse::<DateKey>().is_err());
    }

    #[test]
    fn test_serializes_as_integer() {
        let key: DateKey = "20250110".parse().unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "20250110");
    }
}
