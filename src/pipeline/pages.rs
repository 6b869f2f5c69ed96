//! Toplist page builder.
//!
//! Joins each scope's compact index with the cached records it points at and
//! compares it against the index of the range's baseline day.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{load_guild_snapshots, read_lenient, PipelineError};
use crate::config::{EntityLimits, ToplistConfig};
use crate::models::{
    number_value, total_pages, CompactEntry, CompactIndex, DateKey, DeltaRank, EntityKind,
    GuildAvgEntry, PlayerDerived, RawGuildSnapshot, RawPlayerSnapshot, Row, Scope, TimeRange,
    ToplistPage,
};
use crate::normalize::{normalize_server, Field, ResolvedFields};
use crate::storage::{paths, read_doc, write_doc, DocumentStore};

/// Settings for one page-building run.
#[derive(Debug, Clone)]
pub struct PageOptions {
    pub date_key: DateKey,
    pub only: Option<EntityKind>,
    pub ranges: Vec<TimeRange>,
    /// Pause after each page write
    pub throttle: Duration,
}

/// Result of a page-building run.
#[derive(Debug, Clone, Default)]
pub struct PageReport {
    pub written: usize,
    /// Pages skipped because today's index was missing
    pub missing_index: usize,
    /// Rows dropped for missing enrichment
    pub dropped_rows: usize,
}

/// Movement of one entry against the baseline index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delta {
    pub rank: DeltaRank,
    pub value: f64,
}

impl Delta {
    pub fn between(entry: &CompactEntry, baseline: Option<&CompactEntry>) -> Self {
        match baseline {
            Some(base) => Delta {
                rank: DeltaRank::between(Some(base.rank), entry.rank),
                value: entry.val - base.val,
            },
            None => Delta {
                rank: DeltaRank::Unknown,
                value: 0.0,
            },
        }
    }
}

/// Date of the index a range compares against. `None` for `all`.
pub fn baseline_date(date_key: DateKey, range: TimeRange) -> Option<DateKey> {
    range.days().and_then(|days| date_key.minus_days(days))
}

fn last_scan(timestamp: i64) -> Value {
    if timestamp <= 0 {
        return Value::Null;
    }
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|t| Value::String(t.to_rfc3339()))
        .unwrap_or(Value::Null)
}

fn opt_string(s: Option<&str>) -> Value {
    s.map(|s| Value::String(s.to_string())).unwrap_or(Value::Null)
}

fn opt_number(v: Option<f64>) -> Value {
    v.map(number_value).unwrap_or(Value::Null)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Assemble a player row from the configured columns.
pub fn player_row(
    columns: &[String],
    entry: &CompactEntry,
    derived: &PlayerDerived,
    raw: &RawPlayerSnapshot,
    delta: Delta,
) -> Row {
    let fields = ResolvedFields::resolve(&raw.values, Field::PLAYER);
    let mut row = Row::new();
    for key in columns {
        let value = match key.as_str() {
            "rank" => Value::from(entry.rank),
            "id" => Value::String(derived.player_id.clone()),
            "name" => Value::String(derived.name.clone()),
            "class" => Value::String(derived.class.clone()),
            "level" => Value::from(derived.level),
            "guild" => opt_string(derived.guild_name.as_deref()),
            "guildId" => opt_string(derived.guild_id.as_deref()),
            "server" => Value::String(derived.server_key.to_string()),
            "group" => Value::String(derived.group.to_string()),
            "str" => number_value(derived.stats.strength),
            "dex" => number_value(derived.stats.dexterity),
            "int" => number_value(derived.stats.intelligence),
            "con" => number_value(derived.con),
            "lck" => number_value(derived.stats.luck),
            "main" => number_value(derived.main),
            "sum" => number_value(derived.sum),
            "ratio" => number_value(round2(derived.ratio)),
            "treasury" => number_value(fields.get(Field::Treasury)),
            "mine" => number_value(fields.get(Field::GemMine)),
            "lastScan" => last_scan(raw.timestamp),
            "deltaRank" => delta.rank.to_value(),
            "deltaSum" => number_value(delta.value),
            _ => Value::Null,
        };
        row.push(key.clone(), value);
    }
    row
}

/// Assemble a guild row from the configured columns.
pub fn guild_row(
    columns: &[String],
    entry: &CompactEntry,
    guild: &RawGuildSnapshot,
    avg: &GuildAvgEntry,
    delta: Delta,
) -> Row {
    let fields = ResolvedFields::resolve(&guild.values, Field::GUILD);
    let location = normalize_server(&guild.server);
    let mut row = Row::new();
    for key in columns {
        let value = match key.as_str() {
            "rank" => Value::from(entry.rank),
            "id" => Value::String(entry.id.clone()),
            "name" => Value::String(guild.name.clone()),
            "server" => Value::String(location.server_key.to_string()),
            "group" => Value::String(location.group.to_string()),
            "members" => {
                if fields.has(Field::Members) {
                    number_value(fields.get(Field::Members))
                } else {
                    Value::from(avg.member_count)
                }
            }
            "honor" => number_value(fields.get(Field::Honor)),
            "hofRank" => number_value(fields.get(Field::HallOfFameRank)),
            "avgLevel" => opt_number(avg.avg_level.map(round2)),
            "avgMain" => opt_number(avg.avg_main.map(round2)),
            "avgCon" => opt_number(avg.avg_con.map(round2)),
            "sumAvg" => opt_number(avg.avg_sum.map(round2)),
            "raids" => number_value(fields.get(Field::Raids)),
            "portal" => number_value(fields.get(Field::Portal)),
            "hydra" => number_value(fields.get(Field::Hydra)),
            "pet" => number_value(fields.get(Field::Pet)),
            "lastScan" => last_scan(guild.timestamp),
            "deltaRank" => delta.rank.to_value(),
            "deltaSumAvg" => number_value(round2(delta.value)),
            _ => Value::Null,
        };
        row.push(key.clone(), value);
    }
    row
}

/// Guild id to the path owner of its `guilds/<owner>/latest` snapshot.
pub type GuildSources = HashMap<String, String>;

/// Map every loadable guild snapshot's id to its document owner.
pub async fn load_guild_sources(store: &dyn DocumentStore) -> Result<GuildSources, PipelineError> {
    Ok(load_guild_snapshots(store)
        .await?
        .into_iter()
        .map(|g| (g.guild_id, g.source_id))
        .collect())
}

async fn build_row(
    store: &dyn DocumentStore,
    kind: EntityKind,
    columns: &[String],
    entry: &CompactEntry,
    delta: Delta,
    guild_sources: &GuildSources,
) -> Result<Option<Row>, PipelineError> {
    match kind {
        EntityKind::Players => {
            let Some(derived) =
                read_lenient::<PlayerDerived>(store, &paths::player_derived(&entry.id)).await?
            else {
                return Ok(None);
            };
            let source = if derived.source_id.is_empty() {
                entry.id.as_str()
            } else {
                derived.source_id.as_str()
            };
            let raw: Option<RawPlayerSnapshot> =
                read_lenient(store, &paths::player_latest(source)).await?;
            Ok(raw.map(|raw| player_row(columns, entry, &derived, &raw, delta)))
        }
        EntityKind::Guilds => {
            let source = guild_sources
                .get(&entry.id)
                .map_or(entry.id.as_str(), String::as_str);
            let Some(guild) =
                read_lenient::<RawGuildSnapshot>(store, &paths::guild_latest(source)).await?
            else {
                return Ok(None);
            };
            let avg: Option<GuildAvgEntry> =
                read_lenient(store, &paths::guild_avg(&entry.id, guild.timestamp)).await?;
            Ok(avg.map(|avg| guild_row(columns, entry, &guild, &avg, delta)))
        }
    }
}

/// Build page 1 of one `(scope, range)`.
///
/// Returns the page and the number of dropped rows, or `None` when today's
/// index does not exist. Guild ids missing from `guild_sources` are looked up
/// under their own id.
pub async fn build_page(
    store: &dyn DocumentStore,
    scope: &Scope,
    range: TimeRange,
    limits: &EntityLimits,
    date_key: DateKey,
    guild_sources: &GuildSources,
    now: DateTime<Utc>,
) -> Result<Option<(ToplistPage, usize)>, PipelineError> {
    let scope_id = scope.scope_id();
    let Some(index) =
        read_doc::<CompactIndex>(store, &paths::compact_index(date_key, &scope_id)).await?
    else {
        return Ok(None);
    };

    let baseline_key = baseline_date(date_key, range);
    let baseline = match baseline_key {
        Some(key) => read_doc::<CompactIndex>(store, &paths::compact_index(key, &scope_id)).await?,
        None => None,
    };
    if baseline_key.is_some() && baseline.is_none() {
        debug!("No baseline for {} {}, deltas unknown", scope_id, range);
    }
    let baseline_by_id: HashMap<&str, &CompactEntry> =
        baseline.as_ref().map(CompactIndex::by_id).unwrap_or_default();

    let kind = scope.sort.entity();
    let mut rows = Vec::new();
    let mut dropped = 0;

    for entry in index.entries.iter().take(limits.page_size) {
        let delta = Delta::between(entry, baseline_by_id.get(entry.id.as_str()).copied());
        match build_row(store, kind, &limits.column_keys, entry, delta, guild_sources).await? {
            Some(row) => rows.push(row),
            None => {
                debug!("Dropping {} from {}: enrichment missing", entry.id, scope_id);
                dropped += 1;
            }
        }
    }

    let total_rows = index.len();
    let page = ToplistPage {
        scope_id,
        sort: scope.sort,
        time_range: range,
        page: 1,
        page_size: limits.page_size,
        total_rows,
        total_pages: total_pages(total_rows, limits.page_size),
        date_key,
        baseline_date_key: baseline_key,
        updated_at: now,
        rows,
    };
    Ok(Some((page, dropped)))
}

/// Build and write page 1 of every scope and range.
pub async fn build_toplist_pages(
    store: &dyn DocumentStore,
    config: &ToplistConfig,
    scopes: &[Scope],
    options: &PageOptions,
    now: DateTime<Utc>,
) -> Result<PageReport, PipelineError> {
    let mut report = PageReport::default();
    let wanted = |scope: &&Scope| options.only.map_or(true, |only| only == scope.sort.entity());

    let guild_sources = if scopes
        .iter()
        .filter(wanted)
        .any(|s| s.sort.entity() == EntityKind::Guilds)
    {
        load_guild_sources(store).await?
    } else {
        GuildSources::new()
    };

    for scope in scopes.iter().filter(wanted) {
        let limits = config.limits(scope.sort.entity());

        for &range in &options.ranges {
            let Some((page, dropped)) = build_page(
                store,
                scope,
                range,
                &limits,
                options.date_key,
                &guild_sources,
                now,
            )
            .await?
            else {
                warn!(
                    "No compact index for {} on {}, skipping {} page",
                    scope, options.date_key, range
                );
                report.missing_index += 1;
                continue;
            };

            let path = paths::toplist_page(&page.scope_id, range, page.page);
            write_doc(store, &path, &page).await?;
            debug!("Wrote {} ({} rows)", path, page.rows.len());
            report.written += 1;
            report.dropped_rows += dropped;

            if !options.throttle.is_zero() {
                tokio::time::sleep(options.throttle).await;
            }
        }
    }

    info!(
        "Toplist pages for {}: {} written, {} skipped, {} rows dropped",
        options.date_key, report.written, report.missing_index, report.dropped_rows
    );
    Ok(report)
}
