//! Guild average cache.
//!
//! Entries at `stats_cache_guild_avg/<guildId>__<timestamp>` are computed at
//! most once per key and never rewritten.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{load_guild_snapshots, load_player_derived, PipelineError};
use crate::models::{GuildAvgEntry, PlayerDerived};
use crate::storage::{commit_chunked, paths, read_doc, write_doc, DocumentStore, WriteBatch};

/// Result of [`ensure_guild_average`].
#[derive(Debug, Clone)]
pub struct GuildAvgOutcome {
    pub entry: GuildAvgEntry,
    /// False when the entry already existed
    pub computed: bool,
}

/// Result of [`ensure_recent_guild_averages`].
#[derive(Debug, Clone, Default)]
pub struct GuildAvgReport {
    /// Guild snapshots updated inside the window
    pub recent: usize,
    pub computed: usize,
    pub existing: usize,
}

/// Average the members scanned together with a guild.
///
/// Only records with the same guild id and snapshot timestamp count.
pub fn compute_guild_average(
    guild_id: &str,
    timestamp: i64,
    members: &[PlayerDerived],
    now: DateTime<Utc>,
) -> GuildAvgEntry {
    let members: Vec<&PlayerDerived> = members
        .iter()
        .filter(|p| p.guild_id.as_deref() == Some(guild_id) && p.timestamp == timestamp)
        .collect();

    let count = members.len();
    let avg = |f: fn(&PlayerDerived) -> f64| -> Option<f64> {
        if count == 0 {
            None
        } else {
            Some(members.iter().map(|p| f(p)).sum::<f64>() / count as f64)
        }
    };

    GuildAvgEntry {
        guild_id: guild_id.to_string(),
        timestamp,
        member_count: count as u32,
        avg_level: avg(|p| f64::from(p.level)),
        avg_main: avg(|p| p.main),
        avg_con: avg(|p| p.con),
        avg_sum: avg(|p| p.sum),
        computed_at: now,
    }
}

/// Return the cached entry for `(guild_id, timestamp)`, computing and
/// writing it on first request.
pub async fn ensure_guild_average(
    store: &dyn DocumentStore,
    guild_id: &str,
    timestamp: i64,
    now: DateTime<Utc>,
) -> Result<GuildAvgOutcome, PipelineError> {
    let path = paths::guild_avg(guild_id, timestamp);

    if let Some(entry) = read_doc::<GuildAvgEntry>(store, &path).await? {
        debug!("Guild average {} already cached", path);
        return Ok(GuildAvgOutcome {
            entry,
            computed: false,
        });
    }

    let players = load_player_derived(store).await?;
    let entry = compute_guild_average(guild_id, timestamp, &players, now);
    write_doc(store, &path, &entry).await?;

    info!(
        "Computed guild average {} over {} members",
        path, entry.member_count
    );
    Ok(GuildAvgOutcome {
        entry,
        computed: true,
    })
}

/// Ensure an entry for every guild snapshot updated since `since`.
///
/// Snapshots without `updatedAt` count as recent. Existing entries are never
/// rewritten, so they cost one read per run once cached.
pub async fn ensure_recent_guild_averages(
    store: &dyn DocumentStore,
    since: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<GuildAvgReport, PipelineError> {
    let guilds = load_guild_snapshots(store).await?;

    let mut report = GuildAvgReport::default();
    let mut missing: Vec<(String, i64)> = Vec::new();
    let mut seen = HashSet::new();

    for guild in &guilds {
        if !guild.raw.updated_at.map_or(true, |t| t >= since) {
            continue;
        }
        report.recent += 1;

        let key = (guild.guild_id.clone(), guild.raw.timestamp);
        if !seen.insert(key.clone()) {
            continue;
        }
        if store.get(&paths::guild_avg(&key.0, key.1)).await?.is_some() {
            report.existing += 1;
        } else {
            missing.push(key);
        }
    }

    if missing.is_empty() {
        info!(
            "Guild averages: {} recent guilds, all {} cached",
            report.recent, report.existing
        );
        return Ok(report);
    }

    let mut members: HashMap<(String, i64), Vec<PlayerDerived>> = HashMap::new();
    for player in load_player_derived(store).await? {
        if let Some(gid) = player.guild_id.clone() {
            members.entry((gid, player.timestamp)).or_default().push(player);
        }
    }

    let mut batch = WriteBatch::new();
    for (guild_id, timestamp) in &missing {
        let group = members
            .get(&(guild_id.clone(), *timestamp))
            .map(Vec::as_slice)
            .unwrap_or_default();
        let entry = compute_guild_average(guild_id, *timestamp, group, now);
        debug!(
            "Guild {} @ {}: {} members",
            guild_id, timestamp, entry.member_count
        );
        batch.set(paths::guild_avg(guild_id, *timestamp), &entry)?;
    }
    report.computed = commit_chunked(store, batch).await?;

    info!(
        "Guild averages: {} recent guilds, {} computed, {} cached",
        report.recent, report.computed, report.existing
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BaseStats, Group, ServerKey};
    use crate::normalize::Attribute;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap()
    }

    fn member(id: &str, guild: &str, ts: i64, level: u32, sum: f64) -> PlayerDerived {
        PlayerDerived {
            player_id: id.to_string(),
            source_id: id.to_string(),
            name: id.to_string(),
            class: "Mage".to_string(),
            level,
            group: Group::Eu,
            server_key: ServerKey::new("EU1"),
            guild_id: Some(guild.to_string()),
            guild_name: None,
            stats: BaseStats {
                intelligence: sum / 2.0,
                constitution: sum / 2.0,
                ..BaseStats::default()
            },
            sum,
            main_attr: Attribute::Intelligence,
            main: sum / 2.0,
            con: sum / 2.0,
            ratio: 0.0,
            timestamp: ts,
            derived_at: now(),
        }
    }

    async fn seed_member(store: &MemoryStore, p: &PlayerDerived) {
        write_doc(store, &paths::player_derived(&p.player_id), p)
            .await
            .unwrap();
    }

    #[test]
    fn test_compute_filters_by_guild_and_timestamp() {
        let members = vec![
            member("a", "g1", 100, 10, 1000.0),
            member("b", "g1", 100, 30, 3000.0),
            member("c", "g1", 99, 50, 9000.0),
            member("d", "g2", 100, 50, 9000.0),
        ];
        let entry = compute_guild_average("g1", 100, &members, now());

        assert_eq!(entry.member_count, 2);
        assert_eq!(entry.avg_level, Some(20.0));
        assert_eq!(entry.avg_sum, Some(2000.0));
        assert_eq!(entry.avg_main, Some(1000.0));
        assert_eq!(entry.avg_con, Some(1000.0));
    }

    #[test]
    fn test_compute_without_members() {
        let entry = compute_guild_average("g1", 100, &[], now());
        assert_eq!(entry.member_count, 0);
        assert_eq!(entry.avg_sum, None);
        assert_eq!(entry.avg_level, None);
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let store = MemoryStore::new();
        seed_member(&store, &member("a", "g1", 100, 10, 1000.0)).await;

        let first = ensure_guild_average(&store, "g1", 100, now()).await.unwrap();
        assert!(first.computed);
        let path = paths::guild_avg("g1", 100);
        let stored = serde_json::to_vec(&store.get(&path).await.unwrap()).unwrap();
        let writes = store.writes();

        let later = now() + Duration::hours(3);
        let second = ensure_guild_average(&store, "g1", 100, later).await.unwrap();

        assert!(!second.computed);
        assert_eq!(second.entry, first.entry);
        assert_eq!(store.writes(), writes);
        let again = serde_json::to_vec(&store.get(&path).await.unwrap()).unwrap();
        assert_eq!(stored, again);
    }

    #[tokio::test]
    async fn test_recent_guilds_only() {
        let store = MemoryStore::new();
        let since = now() - Duration::hours(48);

        seed_member(&store, &member("a", "g1", 100, 10, 1000.0)).await;
        seed_member(&store, &member("b", "g1", 100, 20, 3000.0)).await;
        store
            .set(
                "guilds/g1/latest",
                json!({"timestamp": 100, "updatedAt": now() - Duration::hours(1)}),
            )
            .await
            .unwrap();
        store
            .set(
                "guilds/g2/latest",
                json!({"timestamp": 100, "updatedAt": now() - Duration::hours(72)}),
            )
            .await
            .unwrap();
        store
            .set("guilds/g3/latest", json!({"timestamp": 5}))
            .await
            .unwrap();

        let report = ensure_recent_guild_averages(&store, since, now())
            .await
            .unwrap();
        assert_eq!(report.recent, 2);
        assert_eq!(report.computed, 2);

        let entry: GuildAvgEntry = read_doc(&store, &paths::guild_avg("g1", 100))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.member_count, 2);
        assert_eq!(entry.avg_sum, Some(2000.0));
        assert!(store.get(&paths::guild_avg("g2", 100)).await.unwrap().is_none());

        let undated: GuildAvgEntry = read_doc(&store, &paths::guild_avg("g3", 5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(undated.member_count, 0);
        assert_eq!(undated.avg_sum, None);

        let writes = store.writes();
        let report = ensure_recent_guild_averages(&store, since, now())
            .await
            .unwrap();
        assert_eq!(report.computed, 0);
        assert_eq!(report.existing, 2);
        assert_eq!(store.writes(), writes);
    }
}
