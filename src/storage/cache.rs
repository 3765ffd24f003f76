//! Graph caches
//!
//! Loading and re-parsing graph files is cheap for small solutions but adds
//! up when the same graphs are consulted by several restore operations. A
//! [`GraphCache`] stores graphs by string key (usually the canonical file
//! path) together with the last-modified time they were read at.
//!
//! Caches are injected through [`CacheContext`], which also carries the
//! current solution graph and a logging span. Three stores are provided:
//!
//! - [`MemoryCache`] keeps graphs for the lifetime of the process
//! - [`SqliteGraphCache`] persists them in `graphs.db`
//! - [`NoopCache`] stores nothing

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::{debug, Span};

use super::document::{self, DocumentError};
use crate::domain::DependencyGraphSpec;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// A keyed store of graphs and their last-modified times
pub trait GraphCache {
    fn graph(&self, key: &str) -> Result<Option<Arc<DependencyGraphSpec>>, CacheError>;

    fn set_graph(&mut self, key: &str, graph: Arc<DependencyGraphSpec>) -> Result<(), CacheError>;

    fn last_modified(&self, key: &str) -> Result<Option<DateTime<Utc>>, CacheError>;

    fn set_last_modified(&mut self, key: &str, at: DateTime<Utc>) -> Result<(), CacheError>;

    /// Removes every entry
    fn clear(&mut self) -> Result<(), CacheError>;

    /// Number of cached graphs
    fn len(&self) -> Result<usize, CacheError>;
}

impl<C: GraphCache + ?Sized> GraphCache for Box<C> {
    fn graph(&self, key: &str) -> Result<Option<Arc<DependencyGraphSpec>>, CacheError> {
        (**self).graph(key)
    }

    fn set_graph(&mut self, key: &str, graph: Arc<DependencyGraphSpec>) -> Result<(), CacheError> {
        (**self).set_graph(key, graph)
    }

    fn last_modified(&self, key: &str) -> Result<Option<DateTime<Utc>>, CacheError> {
        (**self).last_modified(key)
    }

    fn set_last_modified(&mut self, key: &str, at: DateTime<Utc>) -> Result<(), CacheError> {
        (**self).set_last_modified(key, at)
    }

    fn clear(&mut self) -> Result<(), CacheError> {
        (**self).clear()
    }

    fn len(&self) -> Result<usize, CacheError> {
        (**self).len()
    }
}

/// In-process cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    graphs: HashMap<String, Arc<DependencyGraphSpec>>,
    last_modified: HashMap<String, DateTime<Utc>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphCache for MemoryCache {
    fn graph(&self, key: &str) -> Result<Option<Arc<DependencyGraphSpec>>, CacheError> {
        Ok(self.graphs.get(key).cloned())
    }

    fn set_graph(&mut self, key: &str, graph: Arc<DependencyGraphSpec>) -> Result<(), CacheError> {
        self.graphs.insert(key.to_string(), graph);
        Ok(())
    }

    fn last_modified(&self, key: &str) -> Result<Option<DateTime<Utc>>, CacheError> {
        Ok(self.last_modified.get(key).copied())
    }

    fn set_last_modified(&mut self, key: &str, at: DateTime<Utc>) -> Result<(), CacheError> {
        self.last_modified.insert(key.to_string(), at);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), CacheError> {
        self.graphs.clear();
        self.last_modified.clear();
        Ok(())
    }

    fn len(&self) -> Result<usize, CacheError> {
        Ok(self.graphs.len())
    }
}

/// Cache that never stores anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl GraphCache for NoopCache {
    fn graph(&self, _key: &str) -> Result<Option<Arc<DependencyGraphSpec>>, CacheError> {
        Ok(None)
    }

    fn set_graph(&mut self, _key: &str, _graph: Arc<DependencyGraphSpec>) -> Result<(), CacheError> {
        Ok(())
    }

    fn last_modified(&self, _key: &str) -> Result<Option<DateTime<Utc>>, CacheError> {
        Ok(None)
    }

    fn set_last_modified(&mut self, _key: &str, _at: DateTime<Utc>) -> Result<(), CacheError> {
        Ok(())
    }

    fn clear(&mut self) -> Result<(), CacheError> {
        Ok(())
    }

    fn len(&self) -> Result<usize, CacheError> {
        Ok(0)
    }
}

/// A row of the persistent cache
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub hash: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// SQLite-backed cache
///
/// Graphs loaded from a file are stored as the JSON they were loaded from, so
/// a cache hit rebuilds exactly the graph a fresh load would. Other graphs are
/// stored as their document text. Either way the body is parsed again on read.
pub struct SqliteGraphCache {
    db_path: PathBuf,
    conn: Connection,
}

impl SqliteGraphCache {
    /// Schema version - bump when schema changes to force rebuild
    const SCHEMA_VERSION: i32 = 1;

    /// File name of the database inside a cache directory
    pub const FILE_NAME: &'static str = "graphs.db";

    /// Creates or opens the cache database at `db_path`
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let mut cache = Self { db_path, conn };
        cache.ensure_schema()?;

        debug!(path = %cache.db_path.display(), "opened graph cache");
        Ok(cache)
    }

    /// Opens `graphs.db` inside `dir`
    pub fn open_in(dir: &Path) -> Result<Self, CacheError> {
        Self::open(dir.join(Self::FILE_NAME))
    }

    /// Returns the path to the database
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn ensure_schema(&mut self) -> Result<(), CacheError> {
        let current: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if current != Self::SCHEMA_VERSION {
            self.conn.execute_batch(
                "
                DROP TABLE IF EXISTS graphs;

                CREATE TABLE graphs (
                    key TEXT PRIMARY KEY,
                    body TEXT,
                    hash TEXT,
                    last_modified TEXT
                );
                ",
            )?;

            self.conn.execute(
                &format!("PRAGMA user_version = {}", Self::SCHEMA_VERSION),
                [],
            )?;
        }

        Ok(())
    }

    /// Lists cached entries ordered by key
    pub fn entries(&self) -> Result<Vec<CacheEntry>, CacheError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, hash, last_modified FROM graphs ORDER BY key")?;

        let entries = stmt
            .query_map([], |row| {
                let last_modified: Option<String> = row.get(2)?;
                Ok(CacheEntry {
                    key: row.get(0)?,
                    hash: row.get(1)?,
                    last_modified: last_modified.as_deref().and_then(parse_timestamp),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

impl GraphCache for SqliteGraphCache {
    fn graph(&self, key: &str) -> Result<Option<Arc<DependencyGraphSpec>>, CacheError> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM graphs WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        match body {
            Some(text) => Ok(Some(Arc::new(document::load_str(&text, Path::new(key))?))),
            None => Ok(None),
        }
    }

    fn set_graph(&mut self, key: &str, graph: Arc<DependencyGraphSpec>) -> Result<(), CacheError> {
        let text = match graph.source_json() {
            Some(source) => serde_json::to_string(source).map_err(DocumentError::from)?,
            None => document::GraphDocument::from_graph(&graph)
                .map_err(DocumentError::from)?
                .to_json_string()?,
        };
        let hash = blake3::hash(text.as_bytes()).to_hex().to_string();

        self.conn.execute(
            "INSERT INTO graphs (key, body, hash) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET body = excluded.body, hash = excluded.hash",
            params![key, text, hash],
        )?;

        Ok(())
    }

    fn last_modified(&self, key: &str) -> Result<Option<DateTime<Utc>>, CacheError> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT last_modified FROM graphs WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        Ok(value.as_deref().and_then(parse_timestamp))
    }

    fn set_last_modified(&mut self, key: &str, at: DateTime<Utc>) -> Result<(), CacheError> {
        self.conn.execute(
            "INSERT INTO graphs (key, last_modified) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET last_modified = excluded.last_modified",
            params![key, at.to_rfc3339_opts(SecondsFormat::Nanos, true)],
        )?;

        Ok(())
    }

    fn clear(&mut self) -> Result<(), CacheError> {
        self.conn.execute("DELETE FROM graphs", [])?;
        Ok(())
    }

    fn len(&self) -> Result<usize, CacheError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM graphs WHERE body IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// Returns the cache key of a graph file
pub fn cache_key(path: &Path) -> String {
    fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

/// Cache, solution graph and logger shared by the graph consumers of a run
pub struct CacheContext<C: GraphCache = MemoryCache> {
    cache: C,
    solution_spec: Option<Arc<DependencyGraphSpec>>,
    solution_spec_hash: Option<String>,
    logger: Span,
}

impl<C: GraphCache> CacheContext<C> {
    /// Creates a context that does not log
    pub fn new(cache: C) -> Self {
        Self::with_logger(cache, Span::none())
    }

    /// Creates a context whose cache activity is recorded under `logger`
    pub fn with_logger(cache: C, logger: Span) -> Self {
        Self {
            cache,
            solution_spec: None,
            solution_spec_hash: None,
            logger,
        }
    }

    pub fn logger(&self) -> &Span {
        &self.logger
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut C {
        &mut self.cache
    }

    pub fn solution_spec(&self) -> Option<&Arc<DependencyGraphSpec>> {
        self.solution_spec.as_ref()
    }

    /// Content hash of the solution graph, set together with it
    pub fn solution_spec_hash(&self) -> Option<&str> {
        self.solution_spec_hash.as_deref()
    }

    /// Records the solution graph and its content hash
    pub fn set_solution_spec(&mut self, spec: Arc<DependencyGraphSpec>) -> Result<(), DocumentError> {
        let hash = document::content_hash(&spec)?;
        debug!(parent: &self.logger, hash = %hash, projects = spec.len(), "solution graph set");

        self.solution_spec = Some(spec);
        self.solution_spec_hash = Some(hash);
        Ok(())
    }

    /// Loads a graph file through the cache
    ///
    /// A cached graph is reused only while the file's modification time equals
    /// the one recorded when it was cached.
    pub fn load_cached(&mut self, path: &Path) -> Result<Arc<DependencyGraphSpec>, CacheError> {
        let _entered = self.logger.enter();

        let key = cache_key(path);
        let modified: DateTime<Utc> = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| DocumentError::io(path, e))?
            .into();

        if self.cache.last_modified(&key)? == Some(modified) {
            if let Some(graph) = self.cache.graph(&key)? {
                debug!(key = %key, "graph cache hit");
                return Ok(graph);
            }
        }

        debug!(key = %key, "graph cache miss");
        let graph = Arc::new(document::load(path)?);
        self.cache.set_graph(&key, Arc::clone(&graph))?;
        self.cache.set_last_modified(&key, modified)?;

        Ok(graph)
    }
}

impl Default for CacheContext<MemoryCache> {
    fn default() -> Self {
        Self::new(MemoryCache::new())
    }
}
