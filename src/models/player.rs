//! Player snapshot and derived player records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Group, ServerKey};
use crate::normalize::{lenient_timestamp, Attribute};

/// Raw `players/<id>/latest` document as written by the scanner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPlayerSnapshot {
    #[serde(default)]
    pub player_id: Option<String>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub class: Option<String>,

    /// Number or locale-formatted string
    #[serde(default)]
    pub level: Value,

    #[serde(default)]
    pub server: String,

    #[serde(default)]
    pub guild_id: Option<String>,

    #[serde(default)]
    pub guild_name: Option<String>,

    /// Moment the snapshot was taken (unix seconds, number or string)
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: i64,

    /// Last change of this document
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub values: Map<String, Value>,
}

/// The five base attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseStats {
    #[serde(rename = "str")]
    pub strength: f64,
    #[serde(rename = "dex")]
    pub dexterity: f64,
    #[serde(rename = "int")]
    pub intelligence: f64,
    #[serde(rename = "con")]
    pub constitution: f64,
    #[serde(rename = "lck")]
    pub luck: f64,
}

impl BaseStats {
    pub fn sum(&self) -> f64 {
        self.strength + self.dexterity + self.intelligence + self.constitution + self.luck
    }

    pub fn get(&self, attr: Attribute) -> f64 {
        match attr {
            Attribute::Strength => self.strength,
            Attribute::Dexterity => self.dexterity,
            Attribute::Intelligence => self.intelligence,
            Attribute::Constitution => self.constitution,
            Attribute::Luck => self.luck,
        }
    }
}

/// Per-player cache record at `stats_cache_player_derived/<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDerived {
    pub player_id: String,
    /// Owner segment of the `players/<id>/latest` snapshot this came from
    #[serde(default)]
    pub source_id: String,
    pub name: String,
    pub class: String,
    pub level: u32,
    pub group: Group,
    pub server_key: ServerKey,
    pub guild_id: Option<String>,
    pub guild_name: Option<String>,
    pub stats: BaseStats,
    pub sum: f64,
    pub main_attr: Attribute,
    pub main: f64,
    pub con: f64,
    /// `sum / level`, 0 for level 0
    pub ratio: f64,
    /// Snapshot moment this record was derived from
    pub timestamp: i64,
    pub derived_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_snapshot_tolerates_missing_fields() {
        let raw: RawPlayerSnapshot = serde_json::from_value(json!({"name": "Hero"})).unwrap();
        assert_eq!(raw.name, "Hero");
        assert!(raw.player_id.is_none());
        assert!(raw.level.is_null());
        assert_eq!(raw.timestamp, 0);

        let raw: RawPlayerSnapshot =
            serde_json::from_value(json!({"timestamp": "1736500000"})).unwrap();
        assert_eq!(raw.timestamp, 1736500000);

        let raw: RawPlayerSnapshot =
            serde_json::from_value(json!({"timestamp": 1736500000.0})).unwrap();
        assert_eq!(raw.timestamp, 1736500000);
    }

    #[test]
    fn test_base_stats_sum_and_get() {
        let stats = BaseStats {
            strength: 10.0,
            dexterity: 20.0,
            intelligence: 30.0,
            constitution: 40.0,
            luck: 50.0,
        };
        assert_eq!(stats.sum(), 150.0);
        assert_eq!(stats.get(Attribute::Intelligence), 30.0);
    }
}
