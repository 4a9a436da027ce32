//! The `init`, `stats`, and `reset` commands.

use anyhow::{bail, Result};

use crate::app::build_engine;
use crate::config::Config;
use crate::sqlite_storage::SqliteStorage;

/// Create the SQLite schema at `[storage].path`. Idempotent.
pub async fn run_init(config: &Config) -> Result<()> {
    let Some(path) = &config.storage.path else {
        bail!("storage.path must be set in the config to initialize a database");
    };
    SqliteStorage::open(path).await?;
    println!("Database initialized at {}", path.display());
    Ok(())
}

/// Print a summary of the knowledge base.
pub async fn run_stats(config: &Config) -> Result<()> {
    let engine = build_engine(config).await?;
    let stats = engine.stats().await;

    println!("docqa knowledge base");
    println!("====================");
    println!();
    match &config.storage.path {
        Some(path) => {
            let db_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            println!("  Database:    {}", path.display());
            println!("  Size:        {}", format_bytes(db_size));
        }
        None => println!("  Database:    (in memory)"),
    }
    println!();
    println!("  Documents:   {}", stats.documents);
    println!("  Units:       {}", stats.entries);
    println!("  Model:       {}", stats.model);
    println!("  Dimensions:  {}", stats.dims);
    println!();
    Ok(())
}

/// Remove every document and unit.
pub async fn run_reset(config: &Config) -> Result<()> {
    let engine = build_engine(config).await?;
    engine.reset().await?;
    println!("Knowledge base cleared.");
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
