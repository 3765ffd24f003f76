//! Cache CLI commands

use std::path::Path;

use anyhow::{anyhow, Result};
use clap::Subcommand;

use super::output::Output;
use crate::storage::{GraphCache, SqliteGraphCache};

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Show cache status
    Status,

    /// Remove every cached graph
    Clear,
}

pub fn run(cmd: CacheCommands, output: &Output, cache_dir: Option<&Path>) -> Result<()> {
    let dir = cache_dir.ok_or_else(|| anyhow!("Could not determine cache directory"))?;

    match cmd {
        CacheCommands::Status => status(output, dir),
        CacheCommands::Clear => clear(output, dir),
    }
}

fn status(output: &Output, dir: &Path) -> Result<()> {
    let cache = SqliteGraphCache::open_in(dir)?;
    let entries = cache.entries()?;
    let cached = cache.len()?;

    if output.is_json() {
        let entries_json: Vec<_> = entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "key": e.key,
                    "hash": e.hash,
                    "last_modified": e.last_modified.map(|t| t.to_rfc3339()),
                })
            })
            .collect();

        output.data(&serde_json::json!({
            "path": cache.path().display().to_string(),
            "graphs": cached,
            "entries": entries_json,
        }));
    } else {
        println!("Cache Status");
        println!("{}", "=".repeat(40));
        println!("Path: {}", cache.path().display());
        println!("Graphs: {}", cached);

        if !entries.is_empty() {
            println!();
            for entry in &entries {
                let modified = entry
                    .last_modified
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                let hash = entry.hash.as_deref().map(|h| &h[..h.len().min(12)]).unwrap_or("-");
                println!("  {}  {}  {}", hash, modified, entry.key);
            }
        }
    }

    Ok(())
}

fn clear(output: &Output, dir: &Path) -> Result<()> {
    let mut cache = SqliteGraphCache::open_in(dir)?;
    let removed = cache.entries()?.len();
    cache.clear()?;

    output.success(&format!("Cleared {} cached graphs", removed));
    Ok(())
}
