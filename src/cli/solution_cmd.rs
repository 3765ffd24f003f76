//! Solution command
//!
//! A solution file (`dgspec.toml`) lists the graph files that make up one
//! restore. Their graphs are merged, first definition wins, and the restore
//! roots of the solution file are applied to the result.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::info;

use super::app::GraphContext;
use super::graph_cmd::{display_name, load, print_names, restore_order};
use super::output::Output;
use crate::domain::DependencyGraphSpec;
use crate::storage::{Config, SolutionConfig, SOLUTION_FILE};

pub fn run(output: &Output, ctx: &mut GraphContext, dir: Option<PathBuf>) -> Result<()> {
    let start = match dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let solution_file = Config::find_solution_file(&start)
        .ok_or_else(|| anyhow!("No {} found in {} or its parents", SOLUTION_FILE, start.display()))?;
    let solution = SolutionConfig::load(&solution_file)?;

    let graphs = solution
        .graph_paths(&solution_file)
        .iter()
        .map(|path| load(ctx, path))
        .collect::<Result<Vec<_>>>()?;

    let mut merged = DependencyGraphSpec::union(graphs.iter().map(|g| &**g));
    for name in &solution.restore {
        merged.add_restore(name.clone());
    }

    let restore_only = !solution.restore.is_empty();
    let merged = Arc::new(merged);
    ctx.set_solution_spec(Arc::clone(&merged))?;

    let order: Vec<String> = restore_order(&merged, restore_only)
        .iter()
        .map(|spec| display_name(spec).to_string())
        .collect();

    info!(
        solution = %solution_file.display(),
        graphs = graphs.len(),
        projects = merged.len(),
        "solution graph built"
    );

    if output.is_json() {
        output.data(&serde_json::json!({
            "solution": solution_file.display().to_string(),
            "hash": ctx.solution_spec_hash(),
            "projects": merged.len(),
            "order": order,
        }));
    } else {
        print_names(output, "order", &order);
    }

    Ok(())
}
