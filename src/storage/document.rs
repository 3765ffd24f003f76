//! Dependency graph files
//!
//! A graph is persisted as a single JSON document:
//!
//! ```json
//! {
//!   "format": 1,
//!   "restore": { "<projectUniqueName>": {} },
//!   "projects": { "<projectUniqueName>": { ... } }
//! }
//! ```
//!
//! Keys are written in ordinal order, so two equal graphs always produce the
//! same text. The content hash of a graph is the blake3 hash of that text.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::domain::{DependencyGraphSpec, GraphError, ProjectSpec};

/// Current graph file format
pub const FORMAT_VERSION: u64 = 1;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid dependency graph file {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid project '{name}' in {}: {source}", .path.display())]
    InvalidProject {
        path: PathBuf,
        name: String,
        source: serde_json::Error,
    },

    #[error("Unsupported dependency graph format {found} in {}", .path.display())]
    UnsupportedFormat { path: PathBuf, found: String },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Failed to serialize dependency graph: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl DocumentError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Serialized form of a [`DependencyGraphSpec`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub format: u64,

    /// Restore entry points; values carry no data
    pub restore: BTreeMap<String, Map<String, Value>>,

    pub projects: BTreeMap<String, ProjectSpec>,
}

impl GraphDocument {
    /// Builds the document of a graph
    ///
    /// Projects are keyed by their own unique name. Nameless projects keep
    /// the key they were stored under. Two projects that would be written
    /// under the same name fail with [`GraphError::DuplicateProject`].
    pub fn from_graph(graph: &DependencyGraphSpec) -> Result<Self, GraphError> {
        use std::collections::btree_map::Entry;

        let restore = graph
            .restore()
            .into_iter()
            .map(|name| (name, Map::new()))
            .collect();

        let mut projects = BTreeMap::new();
        for key in graph.project_names() {
            let Some(spec) = graph.get_project_spec(&key) else {
                continue;
            };
            let name = spec.unique_name().map(str::to_string).unwrap_or(key);

            match projects.entry(name) {
                Entry::Occupied(entry) => {
                    return Err(GraphError::DuplicateProject(entry.key().clone()))
                }
                Entry::Vacant(entry) => {
                    entry.insert(spec.as_ref().clone());
                }
            }
        }

        Ok(Self {
            format: FORMAT_VERSION,
            restore,
            projects,
        })
    }

    /// Rebuilds a graph from the document, inserting projects under their keys
    pub fn into_graph(self) -> Result<DependencyGraphSpec, GraphError> {
        let mut graph = DependencyGraphSpec::new();

        for name in self.restore.into_keys() {
            graph.add_restore(name);
        }

        for (name, spec) in self.projects {
            graph.insert_project(name, Arc::new(spec))?;
        }

        Ok(graph)
    }

    /// Renders the canonical text form (two-space indentation)
    pub fn to_json_string(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Parses graph JSON text; `origin` is only used in error messages
pub fn load_str(text: &str, origin: &Path) -> Result<DependencyGraphSpec, DocumentError> {
    let root: Map<String, Value> =
        serde_json::from_str(text).map_err(|source| DocumentError::Json {
            path: origin.to_path_buf(),
            source,
        })?;

    from_json(Value::Object(root), origin)
}

/// Builds a graph from parsed JSON
///
/// The whole load fails on the first project that does not parse.
pub fn from_json(json: Value, origin: &Path) -> Result<DependencyGraphSpec, DocumentError> {
    match json.get("format") {
        None => {}
        Some(format) if format.as_u64() == Some(FORMAT_VERSION) => {}
        Some(other) => {
            return Err(DocumentError::UnsupportedFormat {
                path: origin.to_path_buf(),
                found: other.to_string(),
            })
        }
    }

    let mut graph = DependencyGraphSpec::new();

    if let Some(restore) = json.get("restore").and_then(Value::as_object) {
        for name in restore.keys() {
            graph.add_restore(name.clone());
        }
    }

    if let Some(projects) = json.get("projects").and_then(Value::as_object) {
        for (name, value) in projects {
            let spec: ProjectSpec = serde_json::from_value(value.clone()).map_err(|source| {
                DocumentError::InvalidProject {
                    path: origin.to_path_buf(),
                    name: name.clone(),
                    source,
                }
            })?;

            graph.insert_project(name.clone(), Arc::new(spec))?;
        }
    }

    graph.set_source_json(json);
    Ok(graph)
}

/// Loads a graph file
pub fn load(path: &Path) -> Result<DependencyGraphSpec, DocumentError> {
    let mut file = File::open(path).map_err(|e| DocumentError::io(path, e))?;

    file.lock_shared().map_err(|e| DocumentError::io(path, e))?;

    let mut text = String::new();
    file.read_to_string(&mut text)
        .map_err(|e| DocumentError::io(path, e))?;

    // Lock is released when file is dropped
    let graph = load_str(&text, path)?;
    debug!(
        path = %path.display(),
        projects = graph.len(),
        restore = graph.restore().len(),
        "loaded dependency graph"
    );

    Ok(graph)
}

/// Saves a graph file, replacing any existing file
pub fn save(graph: &DependencyGraphSpec, path: &Path) -> Result<(), DocumentError> {
    let text = GraphDocument::from_graph(graph)?.to_json_string()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| DocumentError::io(parent, e))?;
    }

    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| DocumentError::io(&temp_path, e))?;

        file.lock_exclusive()
            .map_err(|e| DocumentError::io(&temp_path, e))?;

        let mut writer = BufWriter::new(&file);
        writer
            .write_all(text.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| DocumentError::io(&temp_path, e))?;
    }

    // Atomic rename
    fs::rename(&temp_path, path).map_err(|e| DocumentError::io(path, e))?;

    debug!(path = %path.display(), projects = graph.len(), "saved dependency graph");
    Ok(())
}

/// Hash of the canonical text form of a graph, hex encoded
pub fn content_hash(graph: &DependencyGraphSpec) -> Result<String, DocumentError> {
    let text = GraphDocument::from_graph(graph)?.to_json_string()?;
    Ok(blake3::hash(text.as_bytes()).to_hex().to_string())
}
