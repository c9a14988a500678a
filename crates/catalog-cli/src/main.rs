//! Catalog Cache CLI - sync the local catalog mirror and search it offline.
//!
//! Results are printed to stdout as JSON (search prints one line per hit);
//! logs go to stderr.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use catalog_cache::SyncConfig;

#[derive(Parser, Debug)]
#[command(name = "catalog-cache")]
#[command(about = "Local catalog mirror with incremental sync and fuzzy search")]
pub struct Args {
    /// JSON configuration file
    #[arg(short, long, env = "CATALOG_CACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Catalog API base URL (overrides the config file)
    #[arg(long, env = "CATALOG_CACHE_BASE_URL")]
    pub base_url: Option<String>,

    /// SQLite database path (defaults to the platform cache directory)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Show record count, version and last sync time
    Info {
        /// Also ask the server whether an update is available
        #[arg(long)]
        check: bool,
    },
    /// Bring the mirror up to date with the server
    Sync {
        /// Skip the sync if the last one is younger than this many hours
        #[arg(long)]
        max_age_hours: Option<u64>,
    },
    /// Fuzzy-search the local mirror
    Search {
        query: String,
        #[arg(short, long, default_value_t = SyncConfig::DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },
    /// Look up records by id
    Get {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show the storage footprint
    Size,
    /// Delete all local records and the sync marker
    Clear,
}

fn init_logging(debug: bool) {
    let builder = FmtSubscriber::builder()
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact();

    if std::env::var_os("RUST_LOG").is_some() {
        builder.with_env_filter(EnvFilter::from_default_env()).init();
    } else {
        let log_level = if debug { Level::DEBUG } else { Level::INFO };
        builder.with_max_level(log_level).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let config = commands::resolve_config(&args)?;
    commands::run(&args.command, config).await
}
