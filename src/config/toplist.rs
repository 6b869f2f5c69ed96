//! The toplist configuration document.
//!
//! Stored at `config/toplists`. Describes which regions are enabled, how each
//! region's servers are enumerated, and the per-entity limits and column
//! layouts used when building pages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::models::{EntityKind, Group, ServerKey};

pub const DEFAULT_PLAYER_TOP_N: usize = 120;
pub const DEFAULT_GUILD_TOP_N: usize = 50;
pub const DEFAULT_PAGE_SIZE: usize = 50;

pub const DEFAULT_PLAYER_COLUMNS: &[&str] = &[
    "rank",
    "name",
    "class",
    "level",
    "guild",
    "server",
    "main",
    "con",
    "sum",
    "ratio",
    "treasury",
    "mine",
    "lastScan",
    "deltaRank",
    "deltaSum",
];

pub const DEFAULT_GUILD_COLUMNS: &[&str] = &[
    "rank",
    "name",
    "server",
    "members",
    "honor",
    "hofRank",
    "avgLevel",
    "avgMain",
    "avgCon",
    "sumAvg",
    "raids",
    "portal",
    "hydra",
    "pet",
    "lastScan",
    "deltaRank",
    "deltaSumAvg",
];

/// How a region's concrete servers are enumerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerRule {
    /// Numbered servers `from..=to`, keyed `<prefix><n>`
    Range {
        from: u32,
        to: u32,
        #[serde(default)]
        prefix: Option<String>,
    },
    /// Explicit server codes
    List(Vec<String>),
}

impl ServerRule {
    /// Concrete server keys for `group`, in enumeration order.
    pub fn server_keys(&self, group: Group) -> Vec<ServerKey> {
        match self {
            ServerRule::Range { from, to, prefix } => {
                let prefix = prefix
                    .clone()
                    .unwrap_or_else(|| group.server_prefix().to_string());
                (*from..=*to)
                    .map(|n| ServerKey::new(format!("{}{}", prefix, n)))
                    .collect()
            }
            ServerRule::List(codes) => codes
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(|c| ServerKey::new(c.to_ascii_uppercase()))
                .collect(),
        }
    }
}

/// Per-entity settings as stored; unset values fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySettings {
    #[serde(rename = "topN", default, skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_keys: Option<Vec<String>>,
}

/// Resolved limits for one entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityLimits {
    pub top_n: usize,
    pub page_size: usize,
    pub column_keys: Vec<String>,
}

/// The toplist configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToplistConfig {
    /// Enabled region groups, in enumeration order
    #[serde(default)]
    pub groups: Vec<Group>,

    /// Server enumeration per region
    #[serde(default)]
    pub servers: BTreeMap<Group, ServerRule>,

    #[serde(default)]
    pub players: EntitySettings,

    #[serde(default)]
    pub guilds: EntitySettings,
}

impl ToplistConfig {
    /// Parse and validate a configuration document.
    pub fn from_value(path: &str, value: serde_json::Value) -> Result<Self, ConfigError> {
        let config: ToplistConfig =
            serde_json::from_value(value).map_err(|source| ConfigError::MalformedDocument {
                path: path.to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Limits for an entity kind with defaults applied.
    pub fn limits(&self, kind: EntityKind) -> EntityLimits {
        let (settings, top_n, columns) = match kind {
            EntityKind::Players => (&self.players, DEFAULT_PLAYER_TOP_N, DEFAULT_PLAYER_COLUMNS),
            EntityKind::Guilds => (&self.guilds, DEFAULT_GUILD_TOP_N, DEFAULT_GUILD_COLUMNS),
        };

        EntityLimits {
            top_n: settings.top_n.unwrap_or(top_n),
            page_size: settings.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            column_keys: settings
                .column_keys
                .clone()
                .unwrap_or_else(|| columns.iter().map(|c| c.to_string()).collect()),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (label, settings) in [("players", &self.players), ("guilds", &self.guilds)] {
            if settings.top_n == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "{}.topN must be greater than 0",
                    label
                )));
            }
            if settings.page_size == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "{}.pageSize must be greater than 0",
                    label
                )));
            }
        }

        for (group, rule) in &self.servers {
            if let ServerRule::Range { from, to, .. } = rule {
                if from > to || *from == 0 {
                    return Err(ConfigError::ValidationError(format!(
                        "servers.{}: invalid range {}..{}",
                        group, from, to
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_document() {
        let config = ToplistConfig::from_value(
            "config/toplists",
            json!({
                "groups": ["EU", "US"],
                "servers": {
                    "EU": {"range": {"from": 1, "to": 3}},
                    "US": {"list": ["am1"]}
                },
                "players": {"topN": 200, "pageSize": 25},
                "guilds": {"columnKeys": ["rank", "name"]}
            }),
        )
        .unwrap();

        assert_eq!(config.groups, vec![Group::Eu, Group::Us]);
        let players = config.limits(EntityKind::Players);
        assert_eq!(players.top_n, 200);
        assert_eq!(players.page_size, 25);
        assert_eq!(players.column_keys.len(), DEFAULT_PLAYER_COLUMNS.len());

        let guilds = config.limits(EntityKind::Guilds);
        assert_eq!(guilds.top_n, DEFAULT_GUILD_TOP_N);
        assert_eq!(guilds.column_keys, vec!["rank", "name"]);
    }

    #[test]
    fn test_range_server_keys() {
        let rule = ServerRule::Range {
            from: 1,
            to: 3,
            prefix: None,
        };
        let keys: Vec<String> = rule
            .server_keys(Group::Eu)
            .into_iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(keys, vec!["EU1", "EU2", "EU3"]);

        let fusion = ServerRule::Range {
            from: 2,
            to: 2,
            prefix: None,
        };
        assert_eq!(fusion.server_keys(Group::Fusion)[0].as_str(), "F2");
    }

    #[test]
    fn test_list_server_keys_uppercased() {
        let rule = ServerRule::List(vec!["am1".to_string(), " ".to_string()]);
        let keys = rule.server_keys(Group::Us);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].as_str(), "AM1");
    }

    #[test]
    fn test_rejects_zero_top_n() {
        let err = ToplistConfig::from_value("config/toplists", json!({"players": {"topN": 0}}));
        assert!(matches!(err, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_rejects_inverted_range() {
        let err = ToplistConfig::from_value(
            "config/toplists",
            json!({"servers": {"EU": {"range": {"from": 5, "to": 1}}}}),
        );
        assert!(matches!(err, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_rejects_unknown_group() {
        let err = ToplistConfig::from_value("config/toplists", json!({"groups": ["MARS"]}));
        assert!(matches!(err, Err(ConfigError::MalformedDocument { .. })));
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ToplistConfig::from_value("config/toplists", json!({})).unwrap();
        assert!(config.groups.is_empty());
        assert_eq!(config.limits(EntityKind::Players).top_n, DEFAULT_PLAYER_TOP_N);
    }
}
