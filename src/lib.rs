//! dgspec - Project dependency graphs for package restore
//!
//! A dependency graph holds the projects of a restore, each with its
//! per-framework references to other projects, and the projects to restore.
//! dgspec merges such graphs, walks their closures, orders projects children
//! first and reads and writes the canonical JSON file format.

pub mod domain;
pub mod storage;
pub mod cli;

pub use domain::{DependencyGraphSpec, GraphError, ProjectReference, ProjectSpec};
pub use storage::{CacheContext, GraphCache, GraphDocument};
