//! Domain models for dgspec
//!
//! Contains the project model and the graph algorithms without any I/O concerns.

mod framework;
mod project;
mod graph;

pub use framework::{FrameworkDependency, FrameworkDependencyFlags};
pub use project::{
    FrameworkInformation, ProjectReference, ProjectRestoreFramework, ProjectSpec, ProjectStyle,
    RestoreMetadata,
};
pub use graph::{sort_by_dependency_order, DependencyGraphSpec, GraphError};
