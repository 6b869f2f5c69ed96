//! Compact daily indexer.
//!
//! Ranks every scope once per day and stores the top entries at
//! `stats_index_compact/<dateKey>__<scopeId>`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{load_guild_snapshots, load_player_derived, GuildSnapshot, PipelineError};
use crate::config::ToplistConfig;
use crate::models::{
    rank_top_n, CompactIndex, DateKey, EntityKind, GuildAvgEntry, PlayerDerived, Scope,
};
use crate::normalize::normalize_server;
use crate::storage::{paths, write_doc, DocumentStore};

/// Settings for one indexing run.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub date_key: DateKey,
    /// Restrict to one entity kind
    pub only: Option<EntityKind>,
    /// Player top-N override
    pub top_n: Option<usize>,
    /// Guild top-N override
    pub top_ng: Option<usize>,
}

/// Result of an indexing run.
#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    /// Scope ids written, in scope order
    pub written: Vec<String>,
    /// Total ranked entries across all written indexes
    pub entries: usize,
}

/// Candidates for a player scope: `(playerId, sum)`.
pub fn player_candidates(scope: &Scope, players: &[PlayerDerived]) -> Vec<(String, f64)> {
    players
        .iter()
        .filter(|p| scope.matches(p.group, &p.server_key))
        .map(|p| (p.player_id.clone(), p.sum))
        .collect()
}

/// Candidates for a guild scope: `(guildId, avgSum)`.
///
/// Guilds without an average entry at their own snapshot timestamp, or whose
/// entry has no `avgSum`, are left out.
pub fn guild_candidates(
    scope: &Scope,
    guilds: &[GuildSnapshot],
    averages: &HashMap<(String, i64), GuildAvgEntry>,
) -> Vec<(String, f64)> {
    guilds
        .iter()
        .filter(|g| {
            let location = normalize_server(&g.raw.server);
            scope.matches(location.group, &location.server_key)
        })
        .filter_map(|g| {
            let avg_sum = averages
                .get(&(g.guild_id.clone(), g.raw.timestamp))?
                .avg_sum?;
            Some((g.guild_id.clone(), avg_sum))
        })
        .collect()
}

/// Every guild average entry, keyed by `(guildId, timestamp)`.
async fn load_guild_averages(
    store: &dyn DocumentStore,
) -> Result<HashMap<(String, i64), GuildAvgEntry>, PipelineError> {
    let mut averages = HashMap::new();
    for doc in store.list(paths::GUILD_AVG).await? {
        match doc.parse::<GuildAvgEntry>() {
            Ok(entry) => {
                averages.insert((entry.guild_id.clone(), entry.timestamp), entry);
            }
            Err(e) => warn!("Skipping guild average: {}", e),
        }
    }
    Ok(averages)
}

/// Build and write the compact index of every scope.
pub async fn build_compact_indexes(
    store: &dyn DocumentStore,
    config: &ToplistConfig,
    scopes: &[Scope],
    options: &IndexOptions,
    now: DateTime<Utc>,
) -> Result<IndexReport, PipelineError> {
    let wants = |kind: EntityKind| options.only.map_or(true, |only| only == kind);
    let has_kind = |kind: EntityKind| scopes.iter().any(|s| s.sort.entity() == kind);

    let players = if wants(EntityKind::Players) && has_kind(EntityKind::Players) {
        load_player_derived(store).await?
    } else {
        Vec::new()
    };

    let (guilds, averages) = if wants(EntityKind::Guilds) && has_kind(EntityKind::Guilds) {
        (
            load_guild_snapshots(store).await?,
            load_guild_averages(store).await?,
        )
    } else {
        (Vec::new(), HashMap::new())
    };

    let player_n = options
        .top_n
        .unwrap_or(config.limits(EntityKind::Players).top_n);
    let guild_n = options
        .top_ng
        .unwrap_or(config.limits(EntityKind::Guilds).top_n);

    let mut report = IndexReport::default();

    for scope in scopes {
        let kind = scope.sort.entity();
        if !wants(kind) {
            continue;
        }

        let entries = match kind {
            EntityKind::Players => rank_top_n(player_candidates(scope, &players), player_n),
            EntityKind::Guilds => {
                rank_top_n(guild_candidates(scope, &guilds, &averages), guild_n)
            }
        };

        let scope_id = scope.scope_id();
        let index = CompactIndex::new(options.date_key, scope_id.clone(), entries, now);
        write_doc(store, &paths::compact_index(options.date_key, &scope_id), &index).await?;

        debug!("Indexed {} with {} entries", scope_id, index.len());
        report.entries += index.len();
        report.written.push(scope_id);
    }

    info!(
        "Compact indexes for {}: {} scopes, {} entries",
        options.date_key,
        report.written.len(),
        report.entries
    );
    Ok(report)
}
