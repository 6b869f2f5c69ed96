//! Player derivation stage.
//!
//! Turns changed `players/<id>/latest` snapshots into normalized
//! `stats_cache_player_derived/<id>` records.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::PipelineError;
use crate::models::{BaseStats, Checkpoint, PlayerDerived, RawPlayerSnapshot};
use crate::normalize::{coerce_number, main_attribute, normalize_server, Field, ResolvedFields};
use crate::storage::{commit_chunked, paths, Document, DocumentStore, WriteBatch};

/// Result of a derivation run.
#[derive(Debug, Clone)]
pub struct DerivationReport {
    /// Player snapshot documents seen
    pub scanned: usize,
    /// Records written
    pub derived: usize,
    /// Snapshots not changed since the checkpoint
    pub unchanged: usize,
    /// Snapshots that could not be parsed
    pub malformed: usize,
    /// Checkpoint to persist once the run succeeded
    pub checkpoint: Checkpoint,
}

/// Build the derived record for one parsed snapshot.
///
/// `source_id` is the snapshot's path owner. It doubles as the player id when
/// the snapshot carries no `playerId`.
pub fn derive_from_snapshot(
    source_id: &str,
    raw: &RawPlayerSnapshot,
    now: DateTime<Utc>,
) -> PlayerDerived {
    let fields = ResolvedFields::resolve(&raw.values, Field::PLAYER);
    let location = normalize_server(&raw.server);

    let stats = BaseStats {
        strength: fields.get(Field::Strength),
        dexterity: fields.get(Field::Dexterity),
        intelligence: fields.get(Field::Intelligence),
        constitution: fields.get(Field::Constitution),
        luck: fields.get(Field::Luck),
    };
    let sum = stats.sum();

    let level_raw = if raw.level.is_null() {
        fields.get(Field::Level)
    } else {
        coerce_number(&raw.level)
    };
    let level = level_raw.max(0.0).round().min(f64::from(u32::MAX)) as u32;

    let class = raw.class.clone().unwrap_or_default();
    let main_attr = main_attribute(&class);

    let ratio = if level == 0 {
        0.0
    } else {
        sum / f64::from(level)
    };

    PlayerDerived {
        player_id: non_empty(raw.player_id.as_deref()).unwrap_or(source_id).to_string(),
        source_id: source_id.to_string(),
        name: raw.name.clone(),
        class,
        level,
        group: location.group,
        server_key: location.server_key,
        guild_id: non_empty(raw.guild_id.as_deref()).map(str::to_string),
        guild_name: non_empty(raw.guild_name.as_deref()).map(str::to_string),
        stats,
        sum,
        main_attr,
        main: stats.get(main_attr),
        con: stats.constitution,
        ratio,
        timestamp: raw.timestamp,
        derived_at: now,
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a `players/<id>/latest` document.
///
/// Returns `None` for documents outside that path shape.
pub fn parse_player_snapshot(
    doc: &Document,
) -> Option<Result<(String, RawPlayerSnapshot), PipelineError>> {
    let owner = paths::latest_owner(&doc.path, paths::PLAYERS)?;
    Some(
        doc.parse::<RawPlayerSnapshot>()
            .map(|raw| (owner.to_string(), raw))
            .map_err(PipelineError::from),
    )
}

/// Derive one `players/<id>/latest` document.
///
/// Other paths, malformed bodies and unusable player ids yield `None`.
pub fn derive_player(doc: &Document, now: DateTime<Utc>) -> Option<PlayerDerived> {
    match parse_player_snapshot(doc) {
        Some(Ok((owner, raw))) => {
            let derived = derive_from_snapshot(&owner, &raw, now);
            if paths::is_valid_id(&derived.player_id) {
                Some(derived)
            } else {
                warn!("Skipping {}: invalid player id {:?}", doc.path, derived.player_id);
                None
            }
        }
        Some(Err(e)) => {
            warn!("Skipping player snapshot: {}", e);
            None
        }
        None => {
            debug!("Not a player snapshot: {}", doc.path);
            None
        }
    }
}

/// Derive every player snapshot changed since `checkpoint`.
///
/// The returned report carries the advanced checkpoint; persisting it is the
/// caller's job.
pub async fn derive_players(
    store: &dyn DocumentStore,
    checkpoint: Checkpoint,
    now: DateTime<Utc>,
) -> Result<DerivationReport, PipelineError> {
    let docs = store.collection_group(paths::LATEST).await?;

    let mut scanned = 0;
    let mut unchanged = 0;
    let mut malformed = 0;
    let mut batch = WriteBatch::new();

    for doc in &docs {
        let parsed = match parse_player_snapshot(doc) {
            Some(parsed) => parsed,
            None => continue,
        };
        scanned += 1;

        let (owner, raw) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Skipping player snapshot: {}", e);
                malformed += 1;
                continue;
            }
        };

        if !checkpoint.is_pending(raw.updated_at) {
            unchanged += 1;
            continue;
        }

        let derived = derive_from_snapshot(&owner, &raw, now);
        if !paths::is_valid_id(&derived.player_id) {
            warn!("Skipping {}: invalid player id {:?}", doc.path, derived.player_id);
            malformed += 1;
            continue;
        }
        debug!(
            "Derived player {} ({} {}, sum {})",
            derived.player_id, derived.group, derived.server_key, derived.sum
        );
        batch.set(paths::player_derived(&derived.player_id), &derived)?;
    }

    let derived = commit_chunked(store, batch).await?;

    info!(
        "Player derivation: {} scanned, {} derived, {} unchanged, {} malformed",
        scanned, derived, unchanged, malformed
    );

    Ok(DerivationReport {
        scanned,
        derived,
        unchanged,
        malformed,
        checkpoint: Checkpoint::at(now),
    })
}
