//! Toplist page documents.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use super::{DateKey, SortMetric};

/// Sentinel rendered when an entity has no baseline rank.
pub const NO_BASELINE: &str = "-";

/// Comparison window of a toplist page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "3d")]
    Days3,
    #[serde(rename = "7d")]
    Days7,
    #[serde(rename = "14d")]
    Days14,
    #[serde(rename = "30d")]
    Days30,
    #[serde(rename = "60d")]
    Days60,
    #[serde(rename = "90d")]
    Days90,
}

impl TimeRange {
    pub const ALL: [TimeRange; 7] = [
        TimeRange::All,
        TimeRange::Days3,
        TimeRange::Days7,
        TimeRange::Days14,
        TimeRange::Days30,
        TimeRange::Days60,
        TimeRange::Days90,
    ];

    /// Baseline distance in days; `None` for `all`.
    pub fn days(&self) -> Option<u32> {
        match self {
            TimeRange::All => None,
            TimeRange::Days3 => Some(3),
            TimeRange::Days7 => Some(7),
            TimeRange::Days14 => Some(14),
            TimeRange::Days30 => Some(30),
            TimeRange::Days60 => Some(60),
            TimeRange::Days90 => Some(90),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::All => "all",
            TimeRange::Days3 => "3d",
            TimeRange::Days7 => "7d",
            TimeRange::Days14 => "14d",
            TimeRange::Days30 => "30d",
            TimeRange::Days60 => "60d",
            TimeRange::Days90 => "90d",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown time range: {}", s))
    }
}

/// Rank movement against the baseline day; positive means moved up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaRank {
    Moved(i64),
    Unknown,
}

impl DeltaRank {
    pub fn between(baseline_rank: Option<u32>, current_rank: u32) -> Self {
        match baseline_rank {
            Some(base) => DeltaRank::Moved(i64::from(base) - i64::from(current_rank)),
            None => DeltaRank::Unknown,
        }
    }

    pub fn to_value(self) -> Value {
        match self {
            DeltaRank::Moved(d) => Value::from(d),
            DeltaRank::Unknown => Value::from(NO_BASELINE),
        }
    }
}

/// One toplist row; columns keep their configured order when serialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(Vec<(String, Value)>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: Value) {
        self.0.push((key.into(), value));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// A materialized toplist page at `toplists/<scopeId>__<range>__p<page>`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToplistPage {
    pub scope_id: String,
    pub sort: SortMetric,
    pub time_range: TimeRange,
    pub page: u32,
    pub page_size: usize,
    pub total_rows: usize,
    pub total_pages: usize,
    pub date_key: DateKey,
    pub baseline_date_key: Option<DateKey>,
    pub updated_at: DateTime<Utc>,
    pub rows: Vec<Row>,
}

/// Number of pages needed for `total_rows`.
pub fn total_pages(total_rows: usize, page_size: usize) -> usize {
    if page_size == 0 {
        0
    } else {
        total_rows.div_ceil(page_size)
    }
}

/// JSON number that stays integral when the value has no fraction.
pub fn number_value(v: f64) -> Value {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15 {
        Value::from(v as i64)
    } else {
        serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_time_range_days() {
        assert_eq!(TimeRange::All.days(), None);
        assert_eq!(TimeRange::Days7.days(), Some(7));
        assert_eq!("90d".parse::<TimeRange>().unwrap(), TimeRange::Days90);
        assert!("1d".parse::<TimeRange>().is_err());
        assert_eq!(serde_json::to_string(&TimeRange::Days14).unwrap(), "\"14d\"");
    }

    #[test]
    fn test_delta_rank() {
        assert_eq!(DeltaRank::between(Some(5), 3), DeltaRank::Moved(2));
        assert_eq!(DeltaRank::between(Some(1), 4), DeltaRank::Moved(-3));
        assert_eq!(DeltaRank::between(None, 3).to_value(), json!("-"));
        assert_eq!(DeltaRank::Moved(2).to_value(), json!(2));
    }

    #[test]
    fn test_row_preserves_column_order() {
        let mut row = Row::new();
        row.push("rank", json!(1));
        row.push("name", json!("Zed"));
        row.push("deltaRank", json!("-"));
        let s = serde_json::to_string(&row).unwrap();
        assert_eq!(s, r#"{"rank":1,"name":"Zed","deltaRank":"-"}"#);
        assert_eq!(row.get("name"), Some(&json!("Zed")));
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 50), 0);
        assert_eq!(total_pages(1, 50), 1);
        assert_eq!(total_pages(120, 50), 3);
        assert_eq!(total_pages(100, 50), 2);
    }

    #[test]
    fn test_number_value() {
        assert_eq!(number_value(100.0), json!(100));
        assert_eq!(number_value(12.5), json!(12.5));
        assert_eq!(number_value(f64::NAN), json!(0));
    }
}
