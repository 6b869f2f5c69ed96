//! Leaderboard scopes.
//!
//! A scope is one leaderboard partition: a region group, either one server in
//! it or all of them, and the metric it is ranked by.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ToplistConfig;

/// Region group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Group {
    #[serde(rename = "EU")]
    Eu,
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "INT")]
    Int,
    #[serde(rename = "FUSION")]
    Fusion,
    /// Synthetic group spanning every server
    #[serde(rename = "ALL")]
    All,
}

impl Group {
    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Eu => "EU",
            Group::Us => "US",
            Group::Int => "INT",
            Group::Fusion => "FUSION",
            Group::All => "ALL",
        }
    }

    /// Prefix for numbered server keys in this group.
    pub fn server_prefix(&self) -> &'static str {
        match self {
            Group::Eu => "EU",
            Group::Us => "AM",
            Group::Int => "W",
            Group::Fusion => "F",
            Group::All => "",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Group {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EU" => Ok(Group::Eu),
            "US" => Ok(Group::Us),
            "INT" => Ok(Group::Int),
            "FUSION" => Ok(Group::Fusion),
            "ALL" => Ok(Group::All),
            other => Err(format!("unknown group: {}", other)),
        }
    }
}

/// Literal server key for group-wide scopes.
pub const ALL_SERVERS: &str = "all";

/// A concrete server code (`EU12`, `AM1`) or `all`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerKey(String);

impl ServerKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn all() -> Self {
        Self(ALL_SERVERS.to_string())
    }

    pub fn is_all(&self) -> bool {
        self.0 == ALL_SERVERS
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which kind of entity a leaderboard ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Players,
    Guilds,
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "players" => Ok(EntityKind::Players),
            "guilds" => Ok(EntityKind::Guilds),
            other => Err(format!("expected 'players' or 'guilds', got '{}'", other)),
        }
    }
}

/// Ranking metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortMetric {
    /// Player base-stat sum
    #[serde(rename = "sum")]
    Sum,
    /// Guild average base-stat sum
    #[serde(rename = "sumAvg")]
    SumAvg,
}

impl SortMetric {
    pub const ALL: [SortMetric; 2] = [SortMetric::Sum, SortMetric::SumAvg];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMetric::Sum => "sum",
            SortMetric::SumAvg => "sumAvg",
        }
    }

    pub fn entity(&self) -> EntityKind {
        match self {
            SortMetric::Sum => EntityKind::Players,
            SortMetric::SumAvg => EntityKind::Guilds,
        }
    }
}

impl fmt::Display for SortMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A leaderboard partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub group: Group,
    pub server_key: ServerKey,
    pub sort: SortMetric,
}

impl Scope {
    pub fn new(group: Group, server_key: ServerKey, sort: SortMetric) -> Self {
        Self {
            group,
            server_key,
            sort,
        }
    }

    /// Unique id, e.g. `EU_all_sum`.
    pub fn scope_id(&self) -> String {
        format!("{}_{}_{}", self.group, self.server_key, self.sort)
    }

    /// Whether an entity at `(group, server_key)` belongs in this scope.
    pub fn matches(&self, group: Group, server_key: &ServerKey) -> bool {
        if self.server_key.is_all() {
            self.group == Group::All || self.group == group
        } else {
            self.server_key == *server_key
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.scope_id())
    }
}

/// Enumerate every scope the configuration enables.
///
/// Each enabled group yields a group-wide scope per metric, followed by a
/// scope per metric for every concrete server in the group's rule.
pub fn expand_scopes(config: &ToplistConfig) -> Vec<Scope> {
    let mut scopes: Vec<Scope> = Vec::new();
    let mut push = |scope: Scope| {
        if !scopes.contains(&scope) {
            scopes.push(scope);
        }
    };

    for &group in &config.groups {
        for sort in SortMetric::ALL {
            push(Scope::new(group, ServerKey::all(), sort));
        }

        if group == Group::All {
            continue;
        }

        let servers = config
            .servers
            .get(&group)
            .map(|rule| rule.server_keys(group))
            .unwrap_or_default();

        for server in servers {
            for sort in SortMetric::ALL {
                push(Scope::new(group, server.clone(), sort));
            }
        }
    }

    scopes
}
