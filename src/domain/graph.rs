//! Dependency graph specification
//!
//! A [`DependencyGraphSpec`] holds the projects of a restore together with the
//! names of the projects to restore. Both collections are kept in ordinal key
//! order so every enumeration, and therefore the serialized form, is stable.
//!
//! Reference graphs may contain cycles and dangling references. The closure
//! walk and the children-first ordering both tolerate them.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;

use super::project::ProjectSpec;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Project already exists in graph: {0}")]
    DuplicateProject(String),
}

/// Projects of a restore and the restore entry points
#[derive(Debug, Clone, Default)]
pub struct DependencyGraphSpec {
    /// Names of the projects to restore
    restore: BTreeSet<String>,

    /// Unique name to project
    projects: BTreeMap<String, Arc<ProjectSpec>>,

    /// Parsed file contents, only set for graphs loaded from JSON and
    /// dropped on the first change
    source: Option<Value>,
}

impl DependencyGraphSpec {
    /// Creates an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the projects to restore, in ordinal order
    pub fn restore(&self) -> Vec<String> {
        self.restore.iter().cloned().collect()
    }

    /// All projects, in ordinal order of their keys
    pub fn projects(&self) -> Vec<Arc<ProjectSpec>> {
        self.projects.values().cloned().collect()
    }

    /// Project keys, in ordinal order
    pub fn project_names(&self) -> Vec<String> {
        self.projects.keys().cloned().collect()
    }

    /// The JSON this graph was loaded from, if any
    pub fn source_json(&self) -> Option<&Value> {
        self.source.as_ref()
    }

    pub(crate) fn set_source_json(&mut self, source: Value) {
        self.source = Some(source);
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn contains_project(&self, unique_name: &str) -> bool {
        self.projects.contains_key(unique_name)
    }

    /// Looks up a project by its exact unique name
    pub fn get_project_spec(&self, unique_name: &str) -> Option<&Arc<ProjectSpec>> {
        self.projects.get(unique_name)
    }

    /// Marks a project as a restore entry point
    pub fn add_restore(&mut self, unique_name: impl Into<String>) {
        if self.restore.insert(unique_name.into()) {
            self.source = None;
        }
    }

    /// Adds a project under its unique name
    ///
    /// Projects without a unique name are stored under a fresh UUID.
    pub fn add_project(&mut self, spec: impl Into<Arc<ProjectSpec>>) -> Result<(), GraphError> {
        let spec = spec.into();
        let key = spec
            .unique_name()
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        self.insert_project(key, spec)
    }

    /// Adds a project under an explicit key
    pub(crate) fn insert_project(
        &mut self,
        key: String,
        spec: Arc<ProjectSpec>,
    ) -> Result<(), GraphError> {
        use std::collections::btree_map::Entry;

        match self.projects.entry(key) {
            Entry::Occupied(entry) => Err(GraphError::DuplicateProject(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(spec);
                self.source = None;
                Ok(())
            }
        }
    }

    /// Returns the full closure of `root`, including `root`, children first
    ///
    /// A missing root yields an empty closure. References to projects that are
    /// not in the graph are skipped.
    pub fn get_closure(&self, root: &str) -> Vec<Arc<ProjectSpec>> {
        let mut closure = Vec::new();
        let mut added: BTreeSet<&str> = BTreeSet::from([root]);
        let mut to_walk: Vec<Option<&Arc<ProjectSpec>>> = vec![self.get_project_spec(root)];

        while let Some(next) = to_walk.pop() {
            let Some(spec) = next else {
                continue;
            };

            closure.push(Arc::clone(spec));

            for name in spec.reference_names() {
                if added.insert(name) {
                    to_walk.push(self.get_project_spec(name));
                }
            }
        }

        sort_by_dependency_order(closure)
    }

    /// Returns the unique names of all projects whose closure contains `root`
    ///
    /// A project counts as its own parent when it is part of its closure.
    pub fn get_parents(&self, root: &str) -> Vec<String> {
        self.projects
            .values()
            .filter_map(|p| p.unique_name())
            .filter(|name| {
                self.get_closure(name)
                    .iter()
                    .any(|p| p.unique_name() == Some(root))
            })
            .map(str::to_string)
            .collect()
    }

    /// Merges graphs, keeping the first project seen for each unique name
    ///
    /// The restore set of the result is empty. Projects are shared with the
    /// inputs, not copied.
    pub fn union<'a>(graphs: impl IntoIterator<Item = &'a DependencyGraphSpec>) -> Self {
        let mut merged = Self::new();

        for graph in graphs {
            for spec in graph.projects.values() {
                let taken = match spec.unique_name() {
                    Some(name) => merged.contains_project(name),
                    None => false,
                };

                if !taken {
                    // cannot collide: the name was checked above or a fresh token is used
                    let _ = merged.add_project(Arc::clone(spec));
                }
            }
        }

        merged
    }

    /// Returns (project, reference) pairs whose reference is not in the graph
    pub fn dangling_references(&self) -> Vec<(String, String)> {
        let mut dangling = Vec::new();

        for (key, spec) in &self.projects {
            for name in spec.reference_names() {
                if !self.contains_project(name) {
                    dangling.push((key.clone(), name.to_string()));
                }
            }
        }

        dangling
    }

    /// Returns restore names that have no project
    pub fn missing_restore_roots(&self) -> Vec<String> {
        self.restore
            .iter()
            .filter(|name| !self.contains_project(name))
            .cloned()
            .collect()
    }

    /// Returns the reference cycles of the graph
    ///
    /// Each cycle is a strongly connected component with more than one member,
    /// or a single project referencing itself.
    pub fn reference_cycles(&self) -> Vec<Vec<String>> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

        for key in self.projects.keys() {
            nodes.insert(key.as_str(), graph.add_node(key.as_str()));
        }

        for (key, spec) in &self.projects {
            for name in spec.reference_names() {
                if let Some(target) = nodes.get(name) {
                    graph.add_edge(nodes[key.as_str()], *target, ());
                }
            }
        }

        let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || graph.contains_edge(component[0], component[0])
            })
            .map(|component| {
                let mut names: Vec<String> =
                    component.into_iter().map(|idx| graph[idx].to_string()).collect();
                names.sort();
                names
            })
            .collect();

        cycles.sort();
        cycles
    }
}

/// Orders projects so that references come before the projects referencing them
///
/// Repeatedly takes the project with the fewest parents among the projects
/// not yet taken (ties broken by ordinal unique name), then reverses. Always
/// terminates, cycles included. A project referencing itself counts as one of
/// its own parents.
///
/// Distinct specs sharing a unique name are told apart by their JSON text, so
/// the result never depends on the input order.
pub fn sort_by_dependency_order(
    specs: impl IntoIterator<Item = Arc<ProjectSpec>>,
) -> Vec<Arc<ProjectSpec>> {
    let mut unique: Vec<Arc<ProjectSpec>> = Vec::new();
    for spec in specs {
        if !unique.iter().any(|s| Arc::ptr_eq(s, &spec)) {
            unique.push(spec);
        }
    }

    let mut to_sort: Vec<(Arc<ProjectSpec>, String)> = unique
        .iter()
        .map(|spec| {
            let shared = unique
                .iter()
                .filter(|other| other.sort_name() == spec.sort_name())
                .count()
                > 1;
            let tie = if shared {
                serde_json::to_string(spec.as_ref()).unwrap_or_default()
            } else {
                String::new()
            };
            (Arc::clone(spec), tie)
        })
        .collect();

    let mut sorted = Vec::with_capacity(to_sort.len());

    while !to_sort.is_empty() {
        let next = to_sort
            .iter()
            .enumerate()
            .map(|(idx, (spec, tie))| {
                (parent_count(&to_sort, spec.sort_name()), spec.sort_name(), tie, idx)
            })
            .min()
            .map(|(_, _, _, idx)| idx);

        match next {
            Some(idx) => sorted.push(to_sort.remove(idx).0),
            None => break,
        }
    }

    sorted.reverse();
    sorted
}

/// Number of specs in `specs` that reference `unique_name`, itself included
fn parent_count(specs: &[(Arc<ProjectSpec>, String)], unique_name: &str) -> usize {
    specs.iter().filter(|(s, _)| s.references(unique_name)).count()
}
