//! Main CLI application structure

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::{cache_cmd, graph_cmd, solution_cmd};
use crate::storage::{CacheContext, Config, GraphCache, NoopCache, SqliteGraphCache};

/// Cache context used by the commands
pub type GraphContext = CacheContext<Box<dyn GraphCache>>;

#[derive(Parser)]
#[command(name = "dgspec")]
#[command(author, version, about = "Inspect, order and merge project dependency graphs")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the configured format)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Do not use the graph cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Directory of the graph cache
    #[arg(long, global = true, env = "DGSPEC_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(flatten)]
    Graph(graph_cmd::GraphCommands),

    /// Merge the graphs listed in dgspec.toml and print the restore order
    Solution {
        /// Directory to search for dgspec.toml (defaults to current directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Manage the graph cache
    #[command(subcommand)]
    Cache(cache_cmd::CacheCommands),
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    init_logging(cli.verbose, &config.global.log_level);

    let output = Output::new(cli.format.unwrap_or(config.global.default_format));
    let cache_dir = config.cache_dir(cli.cache_dir.as_deref());
    let use_cache = config.global.cache.enabled && !cli.no_cache;

    debug!(cache_dir = ?cache_dir, use_cache, "dgspec starting");

    match cli.command {
        Commands::Cache(cmd) => cache_cmd::run(cmd, &output, cache_dir.as_deref())?,

        Commands::Solution { dir } => {
            let mut ctx = open_context(use_cache, cache_dir.as_deref());
            solution_cmd::run(&output, &mut ctx, dir)?
        }

        Commands::Graph(cmd) => {
            let mut ctx = open_context(use_cache, cache_dir.as_deref());
            graph_cmd::run(cmd, &output, &mut ctx)?
        }
    }

    Ok(())
}

/// Installs the stderr log subscriber
fn init_logging(verbose: u8, configured: &str) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(configured))
            .unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Opens the graph cache, falling back to no cache when it cannot be opened
fn open_context(use_cache: bool, cache_dir: Option<&Path>) -> GraphContext {
    let logger = tracing::info_span!("graph_cache");

    let cache: Box<dyn GraphCache> = match cache_dir.filter(|_| use_cache) {
        Some(dir) => match SqliteGraphCache::open_in(dir) {
            Ok(cache) => Box::new(cache),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "graph cache unavailable, continuing without it");
                Box::new(NoopCache)
            }
        },
        None => Box::new(NoopCache),
    };

    CacheContext::with_logger(cache, logger)
}
