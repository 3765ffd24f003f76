//! Project specification model
//!
//! A [`ProjectSpec`] describes one buildable unit: its unique name and, per
//! target framework, the other projects it references. The graph layer only
//! relies on the unique name and the reference list; everything else is
//! carried through so graph files round-trip.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

use super::framework::FrameworkDependency;

/// How a project declares its package dependencies
///
/// Styles this crate does not know are kept verbatim in [`ProjectStyle::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum ProjectStyle {
    #[default]
    Unknown,
    PackageReference,
    ProjectJson,
    PackagesConfig,
    DotnetCliTool,
    DotnetToolReference,
    Standalone,
    Other(String),
}

impl ProjectStyle {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unknown => "Unknown",
            Self::PackageReference => "PackageReference",
            Self::ProjectJson => "ProjectJson",
            Self::PackagesConfig => "PackagesConfig",
            Self::DotnetCliTool => "DotnetCliTool",
            Self::DotnetToolReference => "DotnetToolReference",
            Self::Standalone => "Standalone",
            Self::Other(style) => style,
        }
    }
}

impl From<String> for ProjectStyle {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Unknown" => Self::Unknown,
            "PackageReference" => Self::PackageReference,
            "ProjectJson" => Self::ProjectJson,
            "PackagesConfig" => Self::PackagesConfig,
            "DotnetCliTool" => Self::DotnetCliTool,
            "DotnetToolReference" => Self::DotnetToolReference,
            "Standalone" => Self::Standalone,
            _ => Self::Other(value),
        }
    }
}

impl From<ProjectStyle> for String {
    fn from(style: ProjectStyle) -> Self {
        match style {
            ProjectStyle::Other(style) => style,
            known => known.as_str().to_string(),
        }
    }
}

/// Case-insensitive comparison of project names
///
/// Each character is mapped to its simple upper case form, Unicode included.
/// Characters whose upper case is several characters (such as `ß`) are left
/// as they are.
pub(crate) fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars().map(fold_char).eq(b.chars().map(fold_char))
}

/// Case-folded form of a name, consistent with [`eq_ignore_case`]
pub(crate) fn fold_case(name: &str) -> String {
    name.chars().map(fold_char).collect()
}

fn fold_char(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

/// A reference from one project to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReference {
    /// Unique name of the referenced project
    pub project_unique_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,

    /// Fields this model does not understand, kept for round-tripping
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectReference {
    pub fn new(project_unique_name: impl Into<String>) -> Self {
        Self {
            project_unique_name: project_unique_name.into(),
            project_path: None,
            extra: Map::new(),
        }
    }
}

/// Project references declared for one target framework
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRestoreFramework {
    #[serde(default)]
    pub project_references: Vec<ProjectReference>,

    /// Fields this model does not understand, kept for round-tripping
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Restore-time metadata of a project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_unique_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,

    #[serde(default)]
    pub project_style: ProjectStyle,

    /// Target framework moniker to references
    #[serde(default)]
    pub frameworks: BTreeMap<String, ProjectRestoreFramework>,

    /// Fields this model does not understand, kept for round-tripping
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Framework-level information of a project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkInformation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub framework_references: Vec<FrameworkDependency>,

    /// Fields this model does not understand, kept for round-tripping
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One buildable unit of a dependency graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(rename = "restore", default, skip_serializing_if = "Option::is_none")]
    pub restore_metadata: Option<RestoreMetadata>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub frameworks: BTreeMap<String, FrameworkInformation>,

    /// Fields this model does not understand, kept for round-tripping
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectSpec {
    /// Creates a spec with the given unique name and no references
    pub fn new(unique_name: impl Into<String>) -> Self {
        let unique_name = unique_name.into();
        Self {
            restore_metadata: Some(RestoreMetadata {
                project_name: Some(unique_name.clone()),
                project_unique_name: Some(unique_name),
                ..RestoreMetadata::default()
            }),
            ..Self::default()
        }
    }

    /// Creates a spec without restore metadata, and therefore without a unique name
    pub fn nameless() -> Self {
        Self::default()
    }

    /// Adds a project reference under `framework`
    pub fn with_reference(mut self, framework: &str, unique_name: impl Into<String>) -> Self {
        self.restore_metadata
            .get_or_insert_with(RestoreMetadata::default)
            .frameworks
            .entry(framework.to_string())
            .or_default()
            .project_references
            .push(ProjectReference::new(unique_name));
        self
    }

    /// Adds a framework reference under `framework`
    pub fn with_framework_reference(mut self, framework: &str, dependency: FrameworkDependency) -> Self {
        self.frameworks
            .entry(framework.to_string())
            .or_default()
            .framework_references
            .push(dependency);
        self
    }

    /// Returns the project's unique name, if it has one
    pub fn unique_name(&self) -> Option<&str> {
        self.restore_metadata
            .as_ref()
            .and_then(|m| m.project_unique_name.as_deref())
    }

    /// Returns the unique name used for ordering; nameless specs sort first
    pub(crate) fn sort_name(&self) -> &str {
        self.unique_name().unwrap_or("")
    }

    /// Iterates over every project reference across all target frameworks
    pub fn project_references(&self) -> impl Iterator<Item = &ProjectReference> {
        self.restore_metadata
            .iter()
            .flat_map(|m| m.frameworks.values())
            .flat_map(|f| f.project_references.iter())
    }

    /// Returns referenced unique names, de-duplicated case-insensitively
    ///
    /// The first spelling seen wins and order of first appearance is kept.
    pub fn reference_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.project_references()
            .map(|r| r.project_unique_name.as_str())
            .filter(|name| seen.insert(fold_case(name)))
            .collect()
    }

    /// Returns true if any reference names `unique_name` (case-insensitive)
    pub fn references(&self, unique_name: &str) -> bool {
        self.project_references()
            .any(|r| eq_ignore_case(&r.project_unique_name, unique_name))
    }
}
