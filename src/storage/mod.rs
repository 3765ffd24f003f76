//! # Storage Layer
//!
//! Persistence for dependency graphs, the graph cache and configuration.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Graphs | JSON (`format`, `restore`, `projects`) | any path, e.g. `app.dg.json` |
//! | Graph cache | SQLite | `{cache dir}/graphs.db` |
//! | Config | TOML | `~/.config/dgspec/config.toml` |
//! | Solution | TOML | `dgspec.toml` in the working tree |
//!
//! ## Concurrency Safety
//!
//! - Graph files are read under a shared lock and written under an
//!   exclusive lock (`fs2`)
//! - Graph writes are atomic (temp file + rename)
//! - The SQLite cache runs in WAL mode
//!
//! ## Key Types
//!
//! - [`GraphDocument`] - Canonical serialized form of a graph
//! - [`CacheContext`] - Injected cache, solution graph and logger
//! - [`Config`] - Global configuration

mod document;
mod cache;
mod config;

pub use document::{
    content_hash, from_json, load, load_str, save, DocumentError, GraphDocument, FORMAT_VERSION,
};
pub use cache::{
    cache_key, CacheContext, CacheEntry, CacheError, GraphCache, MemoryCache, NoopCache,
    SqliteGraphCache,
};
pub use config::{
    CacheConfig, Config, ConfigError, GlobalConfig, OutputFormat, SolutionConfig, SOLUTION_FILE,
};
