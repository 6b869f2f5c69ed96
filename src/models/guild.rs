//! Guild snapshot and guild average cache entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::normalize::lenient_timestamp;

/// Raw `guilds/<id>/latest` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGuildSnapshot {
    #[serde(default)]
    pub guild_id: Option<String>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub server: String,

    /// Moment the snapshot was taken (unix seconds, number or string)
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: i64,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub values: Map<String, Value>,
}

/// Guild averages over the members scanned together with the guild.
///
/// Keyed by `(guild_id, timestamp)` and immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildAvgEntry {
    pub guild_id: String,
    pub timestamp: i64,
    pub member_count: u32,
    pub avg_level: Option<f64>,
    pub avg_main: Option<f64>,
    pub avg_con: Option<f64>,
    pub avg_sum: Option<f64>,
    pub computed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_guild_timestamp_forms() {
        for ts in [json!(1736500000), json!("1736500000"), json!(1736500000.0)] {
            let raw: RawGuildSnapshot =
                serde_json::from_value(json!({"name": "Knights", "timestamp": ts})).unwrap();
            assert_eq!(raw.timestamp, 1736500000);
        }

        let raw: RawGuildSnapshot = serde_json::from_value(json!({"name": "Knights"})).unwrap();
        assert_eq!(raw.timestamp, 0);
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = GuildAvgEntry {
            guild_id: "g1".to_string(),
            timestamp: 100,
            member_count: 0,
            avg_level: None,
            avg_main: None,
            avg_con: None,
            avg_sum: None,
            computed_at: Utc::now(),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["guildId"], json!("g1"));
        assert_eq!(value["avgSum"], Value::Null);
        assert_eq!(value["memberCount"], json!(0));
    }
}
