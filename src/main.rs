//! # Filing Context CLI (`fctx`)
//!
//! The `fctx` binary syncs filing corpora into the local cache and runs
//! lexical queries against cached or explicitly supplied documents.
//!
//! ## Usage
//!
//! ```bash
//! fctx --config ./config/fctx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fctx sync <entity>` | Select, fetch and cache filings for a profile |
//! | `fctx ask "<query>"` | Rank chunks from cached or explicit documents |
//! | `fctx profiles` | List selection profiles and their rules |
//! | `fctx manifest <entity>` | Show the cached manifest for a profile |
//!
//! Logging goes to stderr and is controlled by `FCTX_LOG`
//! (e.g. `FCTX_LOG=filing_context=debug`).

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use filing_context::ask::{self, AskCommand, AskParams, RefreshPolicy, ScopeFilter};
use filing_context::config::{self, Config};
use filing_context::connector_edgar::{normalize_cik, EdgarClient};
use filing_context::ingest;
use filing_context::manifest::{self, CacheLayout};
use filing_context::profiles::{self, DEFAULT_PROFILE};
use filing_context::traits::IdentityResolver;

const DEFAULT_CONFIG_PATH: &str = "./config/fctx.toml";

/// Filing Context CLI: sync regulatory filings into a local cache and
/// search them with BM25.
#[derive(Parser)]
#[command(
    name = "fctx",
    about = "Filing Context: a local-first filing cache and lexical retrieval engine",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/fctx.toml` when present; built-in defaults
    /// are used otherwise.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override `[cache].root` from the config file.
    #[arg(long, global = true)]
    cache_root: Option<PathBuf>,

    /// Print structured JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    /// Log progress at info level (overridden by `FCTX_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Sync an entity's filings into the cache.
    ///
    /// Applies the profile's rules in order, reuses cached filings unless
    /// `--refresh` is given, and rewrites the profile manifest.
    Sync {
        /// Ticker or CIK.
        entity: String,

        /// Selection profile (see `fctx profiles`).
        #[arg(long, default_value = DEFAULT_PROFILE)]
        profile: String,

        /// Re-fetch filings even when they are already cached.
        #[arg(long)]
        refresh: bool,
    },

    /// Rank document chunks against a query.
    ///
    /// Documents come from `--doc` paths, a `--manifest` file, or an
    /// entity's cached corpus (`--entity`), which is synced on demand.
    #[command(group(
        ArgGroup::new("corpus")
            .required(true)
            .args(["doc", "manifest", "entity"])
    ))]
    Ask {
        /// Free-text query.
        query: String,

        /// Document file or directory (repeatable).
        #[arg(long = "doc")]
        doc: Vec<PathBuf>,

        /// Use the documents listed in this manifest file.
        #[arg(long, conflicts_with = "doc")]
        manifest: Option<PathBuf>,

        /// Ticker or CIK whose cached corpus should be searched.
        #[arg(long, conflicts_with_all = ["doc", "manifest"])]
        entity: Option<String>,

        /// Selection profile used with `--entity`.
        #[arg(long, default_value = DEFAULT_PROFILE)]
        profile: String,

        /// Only search these form types (repeatable, `--entity` only).
        #[arg(long = "form", requires = "entity")]
        forms: Vec<String>,

        /// Only filings filed on or after this date (YYYY-MM-DD).
        #[arg(long, requires = "entity")]
        since: Option<NaiveDate>,

        /// Only filings filed on or before this date (YYYY-MM-DD).
        #[arg(long, requires = "entity")]
        until: Option<NaiveDate>,

        /// Only the N most recent filings after other filters.
        #[arg(long, requires = "entity")]
        latest: Option<usize>,

        /// Re-sync the corpus before querying.
        #[arg(long, requires = "entity", conflicts_with = "no_sync")]
        refresh: bool,

        /// Never sync; fail if nothing is cached.
        #[arg(long, requires = "entity")]
        no_sync: bool,

        /// Maximum number of results.
        #[arg(long)]
        top_k: Option<usize>,

        /// Lines per chunk.
        #[arg(long)]
        chunk_lines: Option<usize>,

        /// Lines shared between consecutive chunks.
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },

    /// List selection profiles and their rules.
    Profiles,

    /// Show the cached manifest for an entity.
    Manifest {
        /// Ticker or CIK.
        entity: String,

        #[arg(long, default_value = DEFAULT_PROFILE)]
        profile: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env("FCTX_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn cache_root(cli_override: Option<PathBuf>, cfg: &Config) -> PathBuf {
    cli_override.unwrap_or_else(|| cfg.cache.root.clone())
}

/// Resolve an entity argument to a CIK, going to EDGAR only for tickers.
async fn resolve_cik(cfg: &Config, entity: &str) -> anyhow::Result<String> {
    if let Some(cik) = normalize_cik(entity) {
        return Ok(cik);
    }
    let client = EdgarClient::from_config(&cfg.edgar)?;
    Ok(client.resolve(entity).await?.cik)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't require config
    if let Commands::Profiles = cli.command {
        return profiles::list_profiles(cli.json);
    }

    let cfg = config::load_or_default(cli.config.as_deref(), Path::new(DEFAULT_CONFIG_PATH))?;
    let root = cache_root(cli.cache_root, &cfg);

    match cli.command {
        Commands::Sync {
            entity,
            profile,
            refresh,
        } => {
            ingest::run_sync(&cfg, &root, &entity, &profile, refresh, cli.json).await?;
        }
        Commands::Ask {
            query,
            doc,
            manifest,
            entity,
            profile,
            forms,
            since,
            until,
            latest,
            refresh,
            no_sync,
            top_k,
            chunk_lines,
            chunk_overlap,
        } => {
            let defaults = AskParams::from_config(&cfg);
            let params = AskParams {
                top_k: top_k.unwrap_or(defaults.top_k),
                chunk_lines: chunk_lines.unwrap_or(defaults.chunk_lines),
                chunk_overlap: chunk_overlap.unwrap_or(defaults.chunk_overlap),
            };
            let refresh = match (refresh, no_sync) {
                (true, _) => RefreshPolicy::Force,
                (_, true) => RefreshPolicy::Never,
                _ => RefreshPolicy::Auto,
            };
            let cmd = AskCommand {
                query,
                docs: doc,
                manifest,
                entity,
                profile,
                scope: ScopeFilter {
                    forms,
                    since,
                    until,
                    latest,
                },
                refresh,
                params,
                json: cli.json,
            };
            ask::run_ask(&cfg, &root, cmd).await?;
        }
        Commands::Manifest { entity, profile } => {
            let cik = resolve_cik(&cfg, &entity).await?;
            manifest::run_show(&CacheLayout::new(&root), &cik, &profile, cli.json)?;
        }
        Commands::Profiles => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
