use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sf_toplists::config::AppConfig;
use sf_toplists::models::{expand_scopes, CompactIndex, DateKey, EntityKind, TimeRange};
use sf_toplists::pipeline::{Pipeline, PipelineOptions};
use sf_toplists::storage::{paths, read_doc, DocumentStore, FsStore, StorageConfig};

#[derive(Parser)]
#[command(name = "sf-toplists")]
#[command(about = "Precompute Shakes & Fidget toplists from scanned snapshots")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive player records from snapshots changed since the last run
    DerivePlayers,

    /// Compute guild average cache entries
    #[command(group(ArgGroup::new("target").required(true).args(["guild", "since_hours"])))]
    GuildAvg {
        /// Guild id
        #[arg(long, requires = "ts")]
        guild: Option<String>,

        /// Snapshot timestamp of the guild
        #[arg(long, requires = "guild")]
        ts: Option<i64>,

        /// Every guild updated within this many hours
        #[arg(long = "sinceHours")]
        since_hours: Option<u32>,
    },

    /// Build compact indexes, then toplist pages
    BuildToplists {
        #[command(flatten)]
        index: IndexArgs,
    },

    /// Build compact indexes only
    IndexCompact {
        #[command(flatten)]
        index: IndexArgs,
    },

    /// Run every stage: derive, guild averages, indexes, pages
    Run {
        /// Day to index (YYYYMMDD, default today)
        #[arg(long)]
        date: Option<DateKey>,

        /// Guild average window in hours (default from config)
        #[arg(long = "sinceHours")]
        since_hours: Option<u32>,
    },

    /// Debug utilities
    Debug {
        #[command(subcommand)]
        action: DebugAction,
    },
}

#[derive(clap::Args)]
struct IndexArgs {
    /// Day to index (YYYYMMDD, default today)
    #[arg(long)]
    date: Option<DateKey>,

    /// Only build players or guilds
    #[arg(long)]
    only: Option<EntityKind>,

    /// Player top-N override
    #[arg(long = "N")]
    top_n: Option<usize>,

    /// Guild top-N override
    #[arg(long = "Ng")]
    top_ng: Option<usize>,
}

#[derive(Subcommand)]
enum DebugAction {
    /// List every configured scope
    Scopes,

    /// Print one compact index
    Index {
        #[arg(long)]
        scope: String,

        #[arg(long)]
        date: Option<DateKey>,
    },

    /// Print one stored toplist page
    Page {
        #[arg(long)]
        scope: String,

        #[arg(long, default_value = "all")]
        range: TimeRange,
    },
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut app_config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load {:?}", cli.config))?;
    if let Some(dir) = cli.data_dir {
        app_config.data_dir = dir;
    }
    if let Some(level) = cli.log_level {
        app_config.log_level = level;
    }
    app_config.validate()?;

    init_tracing(&app_config.log_level, cli.json_logs);
    tracing::info!("Starting sf-toplists v{}", env!("CARGO_PKG_VERSION"));

    let storage = StorageConfig::new(app_config.data_dir.clone());
    let store: Arc<dyn DocumentStore> = Arc::new(FsStore::from_config(&storage));

    let base_options = PipelineOptions {
        throttle: app_config.throttle(),
        ..PipelineOptions::default()
    };

    let config = Pipeline::new(store.clone(), base_options.clone())
        .load_config()
        .await
        .context("Failed to load toplist configuration")?;

    match cli.command {
        Commands::DerivePlayers => {
            let pipeline = Pipeline::new(store, base_options);
            let report = pipeline
                .derive_players()
                .await
                .context("Player derivation failed")?;

            println!("\n=== Player Derivation ===");
            println!("Scanned:          {}", report.scanned);
            println!("Derived:          {}", report.derived);
            println!("Unchanged:        {}", report.unchanged);
            println!("Malformed:        {}", report.malformed);
        }
        Commands::GuildAvg {
            guild,
            ts,
            since_hours,
        } => {
            let pipeline = Pipeline::new(store, base_options);
            match (guild, ts, since_hours) {
                (Some(guild), Some(ts), _) => {
                    let outcome = pipeline
                        .guild_average(&guild, ts)
                        .await
                        .context("Guild average failed")?;
                    println!("{}", serde_json::to_string_pretty(&outcome.entry)?);
                    if !outcome.computed {
                        println!("(cached)");
                    }
                }
                (_, _, Some(hours)) => {
                    let report = pipeline
                        .recent_guild_averages(i64::from(hours))
                        .await
                        .context("Guild average batch failed")?;

                    println!("\n=== Guild Averages ===");
                    println!("Recent guilds:    {}", report.recent);
                    println!("Computed:         {}", report.computed);
                    println!("Already cached:   {}", report.existing);
                }
                _ => anyhow::bail!("Specify --guild with --ts, or --sinceHours"),
            }
        }
        Commands::BuildToplists { index } => {
            let pipeline = Pipeline::new(store, index.options(base_options));
            let result = pipeline
                .build_toplists(&config)
                .await
                .context("Toplist build failed")?;

            println!("\n=== Toplists ({}) ===", pipeline.options().date_key);
            println!("Indexes written:  {}", result.indexes.written.len());
            println!("Pages written:    {}", result.pages.written);
            println!("Pages skipped:    {}", result.pages.missing_index);
            println!("Rows dropped:     {}", result.pages.dropped_rows);
        }
        Commands::IndexCompact { index } => {
            let pipeline = Pipeline::new(store, index.options(base_options));
            let report = pipeline
                .index_compact(&config)
                .await
                .context("Compact indexing failed")?;

            println!("\n=== Compact Indexes ({}) ===", pipeline.options().date_key);
            for scope_id in &report.written {
                println!("  {}", scope_id);
            }
            println!("Entries:          {}", report.entries);
        }
        Commands::Run { date, since_hours } => {
            let options = PipelineOptions {
                date_key: date.unwrap_or(base_options.date_key),
                ..base_options
            };
            let hours = since_hours.unwrap_or(app_config.guild_window_hours);
            let pipeline = Pipeline::new(store, options);
            let result = pipeline
                .run_all(&config, i64::from(hours))
                .await
                .context("Pipeline run failed")?;

            println!("\n=== Run Results ({}) ===", pipeline.options().date_key);
            println!("Players derived:  {}", result.derivation.derived);
            println!("Guild averages:   {}", result.guild_averages.computed);
            println!("Indexes written:  {}", result.indexes.written.len());
            println!("Pages written:    {}", result.pages.written);
            println!("Rows dropped:     {}", result.pages.dropped_rows);
            println!("Duration:         {:?}", result.duration);
        }
        Commands::Debug { action } => match action {
            DebugAction::Scopes => {
                let scopes = expand_scopes(&config);
                println!("{} scopes:", scopes.len());
                for scope in scopes {
                    println!("  {}", scope);
                }
            }
            DebugAction::Index { scope, date } => {
                let date = date.unwrap_or_else(DateKey::today);
                let path = paths::compact_index(date, &scope);
                let Some(index) = read_doc::<CompactIndex>(store.as_ref(), &path).await? else {
                    println!("No index at {}", path);
                    return Ok(());
                };

                println!("=== {} ({} entries) ===", path, index.len());
                for entry in &index.entries {
                    println!("{:>5}  {:<24} {}", entry.rank, entry.id, entry.val);
                }
            }
            DebugAction::Page { scope, range } => {
                let path = paths::toplist_page(&scope, range, 1);
                match store.get(&path).await? {
                    Some(page) => println!("{}", serde_json::to_string_pretty(&page)?),
                    None => println!("No page at {}", path),
                }
            }
        },
    }

    Ok(())
}

impl IndexArgs {
    fn options(self, base: PipelineOptions) -> PipelineOptions {
        PipelineOptions {
            date_key: self.date.unwrap_or(base.date_key),
            only: self.only,
            top_n: self.top_n,
            top_ng: self.top_ng,
            ..base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_parse_build_toplists() {
        let cli = Cli::try_parse_from([
            "sf-toplists",
            "build-toplists",
            "--date",
            "20250110",
            "--only",
            "guilds",
            "--Ng",
            "10",
        ])
        .unwrap();

        match cli.command {
            Commands::BuildToplists { index } => {
                assert_eq!(index.date, Some("20250110".parse().unwrap()));
                assert_eq!(index.only, Some(EntityKind::Guilds));
                assert_eq!(index.top_ng, Some(10));
                assert_eq!(index.top_n, None);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_guild_avg_requires_target() {
        let err = Cli::try_parse_from(["sf-toplists", "guild-avg"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let err = Cli::try_parse_from(["sf-toplists", "guild-avg", "--guild", "g1"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        assert!(
            Cli::try_parse_from(["sf-toplists", "guild-avg", "--guild", "g1", "--ts", "100"])
                .is_ok()
        );
        assert!(Cli::try_parse_from(["sf-toplists", "guild-avg", "--sinceHours", "24"]).is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Cli::try_parse_from(["sf-toplists", "run", "--date", "2025-01-10"]).is_err());
        assert!(Cli::try_parse_from(["sf-toplists", "index-compact", "--only", "pets"]).is_err());
        assert!(
            Cli::try_parse_from(["sf-toplists", "debug", "page", "--scope", "x", "--range", "1d"])
                .is_err()
        );
    }

    #[test]
    fn test_index_args_override_base() {
        let args = IndexArgs {
            date: None,
            only: Some(EntityKind::Players),
            top_n: Some(5),
            top_ng: None,
        };
        let base = PipelineOptions::default();
        let date = base.date_key;
        let options = args.options(base);
        assert_eq!(options.date_key, date);
        assert_eq!(options.top_n, Some(5));
        assert_eq!(options.only, Some(EntityKind::Players));
    }
}
