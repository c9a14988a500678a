//! Subcommand handlers.

use anyhow::{Context, Result};
use catalog_cache::{
    CancellationToken, CatalogCache, CatalogCacheBuilder, CatalogCacheConfig, RecordId,
    SearchOptions, StorageConfig, SyncOptions,
};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::{Args, Command};

fn default_db_path() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join(StorageConfig::CACHE_DIR_NAME).join(StorageConfig::DB_FILENAME))
        .context("No platform cache directory; pass --db")
}

/// Merge the config file with command-line overrides.
pub fn resolve_config(args: &Args) -> Result<CatalogCacheConfig> {
    let mut config = match &args.config {
        Some(path) => CatalogCacheConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CatalogCacheConfig::default(),
    };

    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    config.db_path = match (&args.db, config.db_path.take()) {
        (Some(db), _) => Some(db.clone()),
        (None, Some(db)) => Some(db),
        (None, None) => Some(default_db_path()?),
    };

    config.validate()?;
    Ok(config)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run(command: &Command, config: CatalogCacheConfig) -> Result<()> {
    let db_path = config.db_path.clone();
    let cache = CatalogCacheBuilder::from_config(config).build()?;
    if let Some(path) = db_path {
        info!("Using catalog database {}", path.display());
    }

    match command {
        Command::Info { check } => info_cmd(&cache, *check).await,
        Command::Sync { max_age_hours } => sync_cmd(&cache, *max_age_hours).await,
        Command::Search { query, limit } => search_cmd(&cache, query, *limit),
        Command::Get { ids } => get_cmd(&cache, ids),
        Command::Size => print_json(&cache.get_cache_size()?),
        Command::Clear => {
            cache.clear_cache().await?;
            info!("Local catalog cleared");
            Ok(())
        }
    }
}

async fn info_cmd(cache: &CatalogCache, check: bool) -> Result<()> {
    let info = cache.get_cache_info()?;
    if !check {
        return print_json(&info);
    }

    let update = cache.check_for_updates().await?;
    print_json(&json!({
        "cache": info,
        "remoteVersion": update.remote_version,
        "remoteCount": update.remote_count,
        "needsUpdate": update.needs_update,
        "syncKind": update.kind.to_string(),
    }))
}

async fn sync_cmd(cache: &CatalogCache, max_age_hours: Option<u64>) -> Result<()> {
    if let Some(hours) = max_age_hours {
        if !cache.needs_refresh(Duration::from_secs(hours.saturating_mul(60 * 60)))? {
            info!("Last sync is younger than {} hours, skipping", hours);
            return Ok(());
        }
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling sync");
            on_signal.cancel();
        }
    });

    let options = SyncOptions::default()
        .with_cancel(cancel)
        .with_progress(|loaded, total| info!("Loaded {}/{} records", loaded, total));
    let outcome = cache
        .sync_with_options(options)
        .await
        .context("Sync failed; local data is unchanged since the last completed sync")?;

    print_json(&json!({
        "kind": outcome.kind.to_string(),
        "syncedCount": outcome.synced_count,
        "addedOrUpdated": outcome.added_or_updated,
        "removed": outcome.removed,
        "version": outcome.version,
    }))
}

fn search_cmd(cache: &CatalogCache, query: &str, limit: usize) -> Result<()> {
    let hits = cache.search_scored(query, SearchOptions::with_limit(limit))?;
    if hits.is_empty() {
        info!("No matches for '{}'", query);
    }
    for hit in hits {
        println!(
            "{}",
            json!({"distance": hit.distance, "record": hit.record})
        );
    }
    Ok(())
}

fn get_cmd(cache: &CatalogCache, ids: &[String]) -> Result<()> {
    let ids: Vec<RecordId> = ids.iter().map(|id| RecordId::from(id.as_str())).collect();
    let found = cache.get_many(&ids)?;
    if found.len() < ids.len() {
        warn!("{} of {} ids not found", ids.len() - found.len(), ids.len());
    }
    print_json(&found)
}
