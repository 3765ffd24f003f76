//! Graph inspection and merge commands

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use serde::Serialize;
use tracing::{info, warn};

use super::app::GraphContext;
use super::output::Output;
use crate::domain::{sort_by_dependency_order, DependencyGraphSpec, ProjectSpec};
use crate::storage::{self, content_hash};

#[derive(Subcommand)]
pub enum GraphCommands {
    /// Show the restore roots and projects of a graph
    Show {
        /// Graph file
        file: PathBuf,
    },

    /// List the closure of a project, children first
    Closure {
        /// Graph file
        file: PathBuf,

        /// Unique name of the root project
        root: String,
    },

    /// List the projects whose closure contains a project
    Parents {
        /// Graph file
        file: PathBuf,

        /// Unique name of the project
        name: String,
    },

    /// List projects in restore order, children first
    Order {
        /// Graph file
        file: PathBuf,

        /// Only order the closures of the restore roots
        #[arg(long)]
        restore_only: bool,
    },

    /// Merge graphs; the first definition of each project wins
    Merge {
        /// Graph files, in priority order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output file
        #[arg(long, short)]
        output: PathBuf,

        /// Carry over the restore roots of the inputs
        #[arg(long)]
        keep_restore: bool,

        /// Add a restore root to the merged graph
        #[arg(long = "restore", value_name = "NAME")]
        restore: Vec<String>,
    },

    /// Print the content hash of a graph
    Hash {
        /// Graph file
        file: PathBuf,
    },

    /// Report dangling references, missing restore roots and cycles
    Check {
        /// Graph file
        file: PathBuf,
    },
}

pub fn run(cmd: GraphCommands, output: &Output, ctx: &mut GraphContext) -> Result<()> {
    match cmd {
        GraphCommands::Show { file } => {
            let graph = load(ctx, &file)?;
            show(output, &graph)
        }
        GraphCommands::Closure { file, root } => {
            let graph = load(ctx, &file)?;
            closure(output, &graph, &root)
        }
        GraphCommands::Parents { file, name } => {
            let graph = load(ctx, &file)?;
            parents(output, &graph, &name)
        }
        GraphCommands::Order { file, restore_only } => {
            let graph = load(ctx, &file)?;
            order(output, &graph, restore_only)
        }
        GraphCommands::Merge {
            files,
            output: out,
            keep_restore,
            restore,
        } => merge(output, ctx, &files, &out, keep_restore, &restore),
        GraphCommands::Hash { file } => {
            let graph = load(ctx, &file)?;
            hash(output, &graph)
        }
        GraphCommands::Check { file } => {
            let graph = load(ctx, &file)?;
            check(output, &graph)
        }
    }
}

/// Loads a graph file through the cache
pub(super) fn load(ctx: &mut GraphContext, path: &Path) -> Result<Arc<DependencyGraphSpec>> {
    ctx.load_cached(path)
        .with_context(|| format!("Failed to load dependency graph: {}", path.display()))
}

/// Display name of a project
pub(super) fn display_name(spec: &ProjectSpec) -> &str {
    spec.unique_name().unwrap_or("<unnamed>")
}

fn names(specs: &[Arc<ProjectSpec>]) -> Vec<String> {
    specs.iter().map(|s| display_name(s).to_string()).collect()
}

/// Prints a list of project names, one per line or as a JSON field
pub(super) fn print_names(output: &Output, key: &str, names: &[String]) {
    if output.is_json() {
        let mut data = serde_json::Map::new();
        data.insert(key.to_string(), serde_json::json!(names));
        output.data(&data);
    } else {
        for name in names {
            output.line(name);
        }
    }
}

#[derive(Serialize)]
struct ProjectSummary<'a> {
    name: &'a str,
    references: Vec<&'a str>,
}

fn show(output: &Output, graph: &DependencyGraphSpec) -> Result<()> {
    let projects = graph.projects();
    let restore = graph.restore();

    if output.is_json() {
        let summaries: Vec<_> = projects
            .iter()
            .map(|p| ProjectSummary {
                name: display_name(p),
                references: p.reference_names(),
            })
            .collect();

        output.data(&serde_json::json!({
            "restore": restore,
            "projects": summaries,
        }));
        return Ok(());
    }

    output.line(&format!("Restore ({})", restore.len()));
    for name in &restore {
        output.row(&["", name.as_str()]);
    }

    output.line(&format!("Projects ({})", projects.len()));
    for project in &projects {
        let references = project.reference_names().join(", ");
        output.row(&["", display_name(project), references.as_str()]);
    }

    Ok(())
}

fn closure(output: &Output, graph: &DependencyGraphSpec, root: &str) -> Result<()> {
    if !graph.contains_project(root) {
        warn!(root, "project not found in graph, closure is empty");
    }

    print_names(output, "closure", &names(&graph.get_closure(root)));
    Ok(())
}

fn parents(output: &Output, graph: &DependencyGraphSpec, name: &str) -> Result<()> {
    print_names(output, "parents", &graph.get_parents(name));
    Ok(())
}

/// Children-first order of a whole graph, or of its restore closures
pub(super) fn restore_order(graph: &DependencyGraphSpec, restore_only: bool) -> Vec<Arc<ProjectSpec>> {
    if restore_only {
        sort_by_dependency_order(
            graph
                .restore()
                .iter()
                .flat_map(|root| graph.get_closure(root)),
        )
    } else {
        sort_by_dependency_order(graph.projects())
    }
}

fn order(output: &Output, graph: &DependencyGraphSpec, restore_only: bool) -> Result<()> {
    print_names(output, "order", &names(&restore_order(graph, restore_only)));
    Ok(())
}

fn merge(
    output: &Output,
    ctx: &mut GraphContext,
    files: &[PathBuf],
    out: &Path,
    keep_restore: bool,
    restore: &[String],
) -> Result<()> {
    let graphs = files
        .iter()
        .map(|file| load(ctx, file))
        .collect::<Result<Vec<_>>>()?;

    let mut merged = DependencyGraphSpec::union(graphs.iter().map(|g| &**g));

    if keep_restore {
        for name in graphs.iter().flat_map(|g| g.restore()) {
            merged.add_restore(name);
        }
    }
    for name in restore {
        merged.add_restore(name.clone());
    }

    storage::save(&merged, out)
        .with_context(|| format!("Failed to write merged graph: {}", out.display()))?;

    info!(inputs = files.len(), projects = merged.len(), "merged graphs");
    output.success(&format!(
        "Merged {} graphs ({} projects) into {}",
        files.len(),
        merged.len(),
        out.display()
    ));

    Ok(())
}

fn hash(output: &Output, graph: &DependencyGraphSpec) -> Result<()> {
    let hash = content_hash(graph)?;

    if output.is_json() {
        output.data(&serde_json::json!({ "hash": hash }));
    } else {
        output.line(&hash);
    }

    Ok(())
}

fn check(output: &Output, graph: &DependencyGraphSpec) -> Result<()> {
    let dangling = graph.dangling_references();
    let missing = graph.missing_restore_roots();
    let cycles = graph.reference_cycles();

    if output.is_json() {
        let dangling_json: Vec<_> = dangling
            .iter()
            .map(|(project, reference)| serde_json::json!({ "project": project, "reference": reference }))
            .collect();

        output.data(&serde_json::json!({
            "dangling_references": dangling_json,
            "missing_restore_roots": missing,
            "cycles": cycles,
        }));
    } else {
        for (project, reference) in &dangling {
            output.line(&format!("dangling reference: {} -> {}", project, reference));
        }
        for name in &missing {
            output.line(&format!("missing restore root: {}", name));
        }
        for cycle in &cycles {
            output.line(&format!("cycle: {}", cycle.join(" -> ")));
        }
        if dangling.is_empty() && missing.is_empty() && cycles.is_empty() {
            output.line("ok");
        }
    }

    for cycle in &cycles {
        warn!(members = %cycle.join(", "), "reference cycle");
    }

    if !dangling.is_empty() || !missing.is_empty() {
        bail!(
            "graph check failed: {} dangling reference(s), {} missing restore root(s)",
            dangling.len(),
            missing.len()
        );
    }

    Ok(())
}
