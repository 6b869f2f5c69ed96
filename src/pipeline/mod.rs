//! Batch pipeline.
//!
//! Runs the toplist stages against a document store:
//! 1. Derive changed player snapshots into cached records
//! 2. Fill the guild average cache for recently scanned guilds
//! 3. Rank every scope into a compact daily index
//! 4. Materialize toplist pages with deltas against baseline days

pub mod guild_avg;
pub mod indexer;
pub mod pages;
pub mod players;

pub use guild_avg::{
    compute_guild_average, ensure_guild_average, ensure_recent_guild_averages, GuildAvgOutcome,
    GuildAvgReport,
};
pub use indexer::{build_compact_indexes, IndexOptions, IndexReport};
pub use pages::{
    build_page, build_toplist_pages, load_guild_sources, GuildSources, PageOptions, PageReport,
};
pub use players::{derive_player, derive_players, DerivationReport};

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, ToplistConfig};
use crate::models::{
    expand_scopes, Checkpoint, DateKey, EntityKind, PlayerDerived, RawGuildSnapshot, TimeRange,
};
use crate::storage::{paths, read_doc, write_doc, DocumentStore, StorageError};

/// Errors that can occur while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Options shared by every stage of a run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Day being indexed
    pub date_key: DateKey,
    /// Restrict indexing and pages to one entity kind
    pub only: Option<EntityKind>,
    /// Player top-N override
    pub top_n: Option<usize>,
    /// Guild top-N override
    pub top_ng: Option<usize>,
    /// Pause between page writes
    pub throttle: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            date_key: DateKey::today(),
            only: None,
            top_n: None,
            top_ng: None,
            throttle: Duration::from_millis(150),
        }
    }
}

/// Result of [`Pipeline::build_toplists`].
#[derive(Debug, Clone)]
pub struct ToplistResult {
    pub indexes: IndexReport,
    pub pages: PageReport,
}

/// Result of [`Pipeline::run_all`].
#[derive(Debug, Clone)]
pub struct RunResult {
    pub derivation: DerivationReport,
    pub guild_averages: GuildAvgReport,
    pub indexes: IndexReport,
    pub pages: PageReport,
    pub duration: Duration,
}

/// Pipeline orchestrator.
pub struct Pipeline {
    store: Arc<dyn DocumentStore>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(store: Arc<dyn DocumentStore>, options: PipelineOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Load the toplist configuration document. Missing is fatal.
    pub async fn load_config(&self) -> Result<ToplistConfig, PipelineError> {
        let value = self
            .store
            .get(paths::TOPLIST_CONFIG)
            .await?
            .ok_or_else(|| ConfigError::MissingDocument(paths::TOPLIST_CONFIG.to_string()))?;
        let config = ToplistConfig::from_value(paths::TOPLIST_CONFIG, value)?;
        debug!(
            "Loaded toplist config: {} groups, {} scopes",
            config.groups.len(),
            expand_scopes(&config).len()
        );
        Ok(config)
    }

    pub async fn load_checkpoint(&self) -> Result<Checkpoint, PipelineError> {
        Ok(read_doc::<Checkpoint>(self.store(), paths::CHECKPOINT)
            .await?
            .unwrap_or_default())
    }

    pub async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), PipelineError> {
        write_doc(self.store(), paths::CHECKPOINT, checkpoint).await?;
        Ok(())
    }

    /// Derive changed players and advance the checkpoint.
    ///
    /// The checkpoint is only saved when derivation succeeded.
    pub async fn derive_players(&self) -> Result<DerivationReport, PipelineError> {
        let checkpoint = self.load_checkpoint().await?;
        let report = derive_players(self.store(), checkpoint, Utc::now()).await?;
        self.save_checkpoint(&report.checkpoint).await?;
        Ok(report)
    }

    /// Ensure one guild average entry.
    pub async fn guild_average(
        &self,
        guild_id: &str,
        timestamp: i64,
    ) -> Result<GuildAvgOutcome, PipelineError> {
        ensure_guild_average(self.store(), guild_id, timestamp, Utc::now()).await
    }

    /// Ensure entries for every guild updated in the last `hours`.
    pub async fn recent_guild_averages(&self, hours: i64) -> Result<GuildAvgReport, PipelineError> {
        let now = Utc::now();
        ensure_recent_guild_averages(self.store(), now - chrono::Duration::hours(hours), now).await
    }

    fn index_options(&self) -> IndexOptions {
        IndexOptions {
            date_key: self.options.date_key,
            only: self.options.only,
            top_n: self.options.top_n,
            top_ng: self.options.top_ng,
        }
    }

    fn page_options(&self) -> PageOptions {
        PageOptions {
            date_key: self.options.date_key,
            only: self.options.only,
            ranges: TimeRange::ALL.to_vec(),
            throttle: self.options.throttle,
        }
    }

    /// Write the compact index of every configured scope.
    pub async fn index_compact(&self, config: &ToplistConfig) -> Result<IndexReport, PipelineError> {
        let scopes = expand_scopes(config);
        build_compact_indexes(
            self.store(),
            config,
            &scopes,
            &self.index_options(),
            Utc::now(),
        )
        .await
    }

    /// Write page 1 of every scope and range.
    pub async fn build_pages(&self, config: &ToplistConfig) -> Result<PageReport, PipelineError> {
        let scopes = expand_scopes(config);
        build_toplist_pages(
            self.store(),
            config,
            &scopes,
            &self.page_options(),
            Utc::now(),
        )
        .await
    }

    /// Compact indexes followed by pages.
    pub async fn build_toplists(
        &self,
        config: &ToplistConfig,
    ) -> Result<ToplistResult, PipelineError> {
        let indexes = self.index_compact(config).await?;
        let pages = self.build_pages(config).await?;
        Ok(ToplistResult { indexes, pages })
    }

    /// Run every stage in order.
    pub async fn run_all(
        &self,
        config: &ToplistConfig,
        guild_window_hours: i64,
    ) -> Result<RunResult, PipelineError> {
        let start = Instant::now();
        info!(
            "Starting pipeline run for {} on {} store",
            self.options.date_key,
            self.store.name()
        );

        let derivation = self.derive_players().await?;
        let guild_averages = self.recent_guild_averages(guild_window_hours).await?;
        let indexes = self.index_compact(config).await?;
        let pages = self.build_pages(config).await?;

        let duration = start.elapsed();
        info!(
            "Pipeline completed: {} players derived, {} guild averages, {} indexes, {} pages in {:?}",
            derivation.derived,
            guild_averages.computed,
            indexes.written.len(),
            pages.written,
            duration
        );

        Ok(RunResult {
            derivation,
            guild_averages,
            indexes,
            pages,
            duration,
        })
    }
}

/// Read a document, treating a malformed body like a missing one.
pub(crate) async fn read_lenient<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    path: &str,
) -> Result<Option<T>, PipelineError> {
    match read_doc::<T>(store, path).await {
        Ok(doc) => Ok(doc),
        Err(StorageError::Malformed { path, source }) => {
            warn!("Ignoring malformed document {}: {}", path, source);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Every player-derived record; unparsable ones are skipped.
pub async fn load_player_derived(
    store: &dyn DocumentStore,
) -> Result<Vec<PlayerDerived>, PipelineError> {
    let docs = store.list(paths::PLAYER_DERIVED).await?;
    let mut players = Vec::with_capacity(docs.len());
    for doc in &docs {
        match doc.parse::<PlayerDerived>() {
            Ok(player) => players.push(player),
            Err(e) => warn!("Skipping player record: {}", e),
        }
    }
    debug!("Loaded {} player-derived records", players.len());
    Ok(players)
}

/// A parsed `guilds/<source_id>/latest` document.
#[derive(Debug, Clone)]
pub struct GuildSnapshot {
    /// `guildId` field, or the path owner when absent
    pub guild_id: String,
    /// Path owner of the snapshot document
    pub source_id: String,
    pub raw: RawGuildSnapshot,
}

/// Every `guilds/<id>/latest` snapshot with a usable guild id.
pub async fn load_guild_snapshots(
    store: &dyn DocumentStore,
) -> Result<Vec<GuildSnapshot>, PipelineError> {
    let docs = store.collection_group(paths::LATEST).await?;
    let mut guilds = Vec::new();
    for doc in &docs {
        let Some(owner) = paths::latest_owner(&doc.path, paths::GUILDS) else {
            continue;
        };
        let raw = match doc.parse::<RawGuildSnapshot>() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping guild snapshot: {}", e);
                continue;
            }
        };

        let guild_id = raw
            .guild_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(owner)
            .to_string();
        if !paths::is_valid_id(&guild_id) {
            warn!("Skipping {}: invalid guild id {:?}", doc.path, guild_id);
            continue;
        }

        guilds.push(GuildSnapshot {
            guild_id,
            source_id: owner.to_string(),
            raw,
        });
    }
    debug!("Loaded {} guild snapshots", guilds.len());
    Ok(guilds)
}
