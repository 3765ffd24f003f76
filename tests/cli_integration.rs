//! CLI integration tests for dgspec
//!
//! These tests run the binary against graph files written to a temp dir and
//! check what the commands print and write.

use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get a command instance for the dgspec binary, with its cache inside `dir`
fn dgspec_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("dgspec"));
    cmd.env("DGSPEC_CACHE_DIR", dir.join(".cache"))
        .env_remove("RUST_LOG");
    cmd
}

fn project(name: &str, references: &[&str]) -> serde_json::Value {
    let refs: Vec<_> = references
        .iter()
        .map(|r| serde_json::json!({ "projectUniqueName": r, "projectPath": format!("/src/{r}.csproj") }))
        .collect();

    serde_json::json!({
        "version": "1.0.0",
        "restore": {
            "projectUniqueName": name,
            "projectName": name,
            "projectStyle": "PackageReference",
            "frameworks": {
                "net8.0": { "projectReferences": refs }
            }
        },
        "frameworks": { "net8.0": {} }
    })
}

/// Writes a graph file; `projects` pairs names with their references
fn write_graph(dir: &Path, file: &str, restore: &[&str], projects: &[(&str, &[&str])]) -> PathBuf {
    let restore: serde_json::Map<_, _> = restore
        .iter()
        .map(|r| (r.to_string(), serde_json::json!({})))
        .collect();
    let projects: serde_json::Map<_, _> = projects
        .iter()
        .map(|(name, refs)| (name.to_string(), project(name, refs)))
        .collect();

    let path = dir.join(file);
    let doc = serde_json::json!({ "format": 1, "restore": restore, "projects": projects });
    fs::write(&path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();
    path
}

fn chain_graph(dir: &TempDir) -> PathBuf {
    write_graph(
        dir.path(),
        "chain.dg.json",
        &["A"],
        &[("A", &["B"]), ("B", &["C"]), ("C", &[])],
    )
}

fn stdout_lines(output: &std::process::Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Inspection
// =============================================================================

#[test]
fn test_show_lists_restore_and_projects() {
    let dir = TempDir::new().unwrap();
    let graph = chain_graph(&dir);

    dgspec_cmd(dir.path())
        .arg("show")
        .arg(&graph)
        .assert()
        .success()
        .stdout(predicate::str::contains("Restore (1)"))
        .stdout(predicate::str::contains("Projects (3)"))
        .stdout(predicate::str::contains("\tA\tB"));
}

#[test]
fn test_show_json() {
    let dir = TempDir::new().unwrap();
    let graph = chain_graph(&dir);

    let output = dgspec_cmd(dir.path())
        .args(["--format", "json", "show"])
        .arg(&graph)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["restore"], serde_json::json!(["A"]));
    assert_eq!(json["projects"][0]["name"], "A");
    assert_eq!(json["projects"][0]["references"], serde_json::json!(["B"]));
}

#[test]
fn test_closure_is_children_first() {
    let dir = TempDir::new().unwrap();
    let graph = chain_graph(&dir);

    let output = dgspec_cmd(dir.path())
        .arg("closure")
        .arg(&graph)
        .arg("A")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(stdout_lines(&output), vec!["C", "B", "A"]);
}

#[test]
fn test_closure_of_missing_project_is_empty() {
    let dir = TempDir::new().unwrap();
    let graph = chain_graph(&dir);

    dgspec_cmd(dir.path())
        .arg("closure")
        .arg(&graph)
        .arg("Missing")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_parents_json() {
    let dir = TempDir::new().unwrap();
    let graph = chain_graph(&dir);

    let output = dgspec_cmd(dir.path())
        .args(["-f", "json", "parents"])
        .arg(&graph)
        .arg("C")
        .output()
        .unwrap();

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["parents"], serde_json::json!(["A", "B", "C"]));
}

#[test]
fn test_order_restore_only() {
    let dir = TempDir::new().unwrap();
    let graph = write_graph(
        dir.path(),
        "two.dg.json",
        &["App"],
        &[("App", &["Lib"]), ("Lib", &[]), ("Tool", &[])],
    );

    let all = dgspec_cmd(dir.path()).arg("order").arg(&graph).output().unwrap();
    assert_eq!(stdout_lines(&all), vec!["Tool", "Lib", "App"]);

    let restore = dgspec_cmd(dir.path())
        .arg("order")
        .arg(&graph)
        .arg("--restore-only")
        .output()
        .unwrap();
    assert_eq!(stdout_lines(&restore), vec!["Lib", "App"]);
}

// =============================================================================
// Merge and hash
// =============================================================================

#[test]
fn test_merge_first_definition_wins() {
    let dir = TempDir::new().unwrap();
    let first = write_graph(dir.path(), "first.dg.json", &["A"], &[("A", &["B"]), ("B", &[])]);
    let second = write_graph(dir.path(), "second.dg.json", &["X"], &[("A", &[]), ("X", &["A"])]);
    let out = dir.path().join("merged.dg.json");

    dgspec_cmd(dir.path())
        .arg("merge")
        .arg(&first)
        .arg(&second)
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged 2 graphs (3 projects)"));

    let merged: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(merged["format"], 1);
    assert_eq!(merged["restore"], serde_json::json!({}));
    assert_eq!(
        merged["projects"]["A"]["restore"]["frameworks"]["net8.0"]["projectReferences"][0]["projectUniqueName"],
        "B"
    );
    assert!(merged["projects"]["X"].is_object());
}

#[test]
fn test_merge_keeps_and_adds_restore() {
    let dir = TempDir::new().unwrap();
    let first = write_graph(dir.path(), "first.dg.json", &["A"], &[("A", &[])]);
    let second = write_graph(dir.path(), "second.dg.json", &["X"], &[("X", &[])]);
    let out = dir.path().join("merged.dg.json");

    dgspec_cmd(dir.path())
        .arg("merge")
        .arg(&first)
        .arg(&second)
        .args(["--keep-restore", "--restore", "Extra", "-o"])
        .arg(&out)
        .assert()
        .success();

    let merged: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    let restore: Vec<_> = merged["restore"].as_object().unwrap().keys().cloned().collect();
    assert_eq!(restore, vec!["A", "Extra", "X"]);
}

#[test]
fn test_hash_is_stable_across_key_order() {
    let dir = TempDir::new().unwrap();
    let graph = chain_graph(&dir);

    // same graph with the projects written in reverse order
    let text = fs::read_to_string(&graph).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    let mut reversed = serde_json::Map::new();
    for name in ["C", "B", "A"] {
        reversed.insert(name.to_string(), value["projects"][name].clone());
    }
    let other = dir.path().join("reversed.dg.json");
    fs::write(
        &other,
        serde_json::json!({ "projects": reversed, "restore": { "A": {} }, "format": 1 }).to_string(),
    )
    .unwrap();

    let a = dgspec_cmd(dir.path()).arg("hash").arg(&graph).output().unwrap();
    let b = dgspec_cmd(dir.path()).arg("hash").arg(&other).output().unwrap();

    assert!(a.status.success());
    assert_eq!(a.stdout, b.stdout);
    assert_eq!(stdout_lines(&a)[0].len(), 64);
}

// =============================================================================
// Check
// =============================================================================

#[test]
fn test_check_clean_graph() {
    let dir = TempDir::new().unwrap();
    let graph = chain_graph(&dir);

    dgspec_cmd(dir.path())
        .arg("check")
        .arg(&graph)
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
}

#[test]
fn test_check_reports_problems() {
    let dir = TempDir::new().unwrap();
    let graph = write_graph(
        dir.path(),
        "broken.dg.json",
        &["A", "Ghost"],
        &[("A", &["B", "Missing"]), ("B", &["A"])],
    );

    dgspec_cmd(dir.path())
        .arg("check")
        .arg(&graph)
        .assert()
        .failure()
        .stdout(predicate::str::contains("dangling reference: A -> Missing"))
        .stdout(predicate::str::contains("missing restore root: Ghost"))
        .stdout(predicate::str::contains("cycle: A -> B"))
        .stderr(predicate::str::contains("graph check failed"));
}

#[test]
fn test_cycle_only_is_not_a_failure() {
    let dir = TempDir::new().unwrap();
    let graph = write_graph(
        dir.path(),
        "cycle.dg.json",
        &["A"],
        &[("A", &["B"]), ("B", &["A"])],
    );

    dgspec_cmd(dir.path())
        .arg("check")
        .arg(&graph)
        .assert()
        .success()
        .stdout(predicate::str::contains("cycle: A -> B"));
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_missing_file_is_error() {
    let dir = TempDir::new().unwrap();

    dgspec_cmd(dir.path())
        .arg("show")
        .arg(dir.path().join("missing.dg.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load dependency graph"));
}

#[test]
fn test_unsupported_format_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("future.dg.json");
    fs::write(&path, r#"{"format": 2, "restore": {}, "projects": {}}"#).unwrap();

    dgspec_cmd(dir.path())
        .arg("show")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported dependency graph format 2"));
}

#[test]
fn test_invalid_project_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.dg.json");
    fs::write(
        &path,
        r#"{"format": 1, "restore": {}, "projects": {"A": {"restore": 5}}}"#,
    )
    .unwrap();

    dgspec_cmd(dir.path())
        .arg("show")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid project 'A'"));
}

// =============================================================================
// Solution
// =============================================================================

#[test]
fn test_solution_merges_listed_graphs() {
    let dir = TempDir::new().unwrap();
    write_graph(dir.path(), "app.dg.json", &[], &[("App", &["Lib"])]);
    fs::create_dir_all(dir.path().join("lib")).unwrap();
    write_graph(&dir.path().join("lib"), "lib.dg.json", &[], &[("Lib", &[]), ("Tool", &[])]);
    fs::write(
        dir.path().join("dgspec.toml"),
        "graphs = [\"app.dg.json\", \"lib/lib.dg.json\"]\nrestore = [\"App\"]\n",
    )
    .unwrap();

    let output = dgspec_cmd(dir.path())
        .arg("solution")
        .arg("--dir")
        .arg(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(stdout_lines(&output), vec!["Lib", "App"]);
}

#[test]
fn test_solution_json_includes_hash() {
    let dir = TempDir::new().unwrap();
    write_graph(dir.path(), "app.dg.json", &[], &[("App", &[])]);
    fs::write(dir.path().join("dgspec.toml"), "graphs = [\"app.dg.json\"]\n").unwrap();

    let output = dgspec_cmd(dir.path())
        .current_dir(dir.path())
        .args(["-f", "json", "solution"])
        .output()
        .unwrap();

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["order"], serde_json::json!(["App"]));
    assert_eq!(json["projects"], 1);
    assert_eq!(json["hash"].as_str().unwrap().len(), 64);
}

// =============================================================================
// Cache
// =============================================================================

#[test]
fn test_cache_status_and_clear() {
    let dir = TempDir::new().unwrap();
    let graph = chain_graph(&dir);

    dgspec_cmd(dir.path()).arg("show").arg(&graph).assert().success();

    let output = dgspec_cmd(dir.path())
        .args(["-f", "json", "cache", "status"])
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["graphs"], 1);
    assert!(json["path"].as_str().unwrap().ends_with("graphs.db"));

    dgspec_cmd(dir.path())
        .args(["cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared 1 cached graphs"));

    dgspec_cmd(dir.path())
        .args(["cache", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Graphs: 0"));
}

#[test]
fn test_no_cache_leaves_cache_empty() {
    let dir = TempDir::new().unwrap();
    let graph = chain_graph(&dir);

    dgspec_cmd(dir.path())
        .arg("--no-cache")
        .arg("show")
        .arg(&graph)
        .assert()
        .success();

    dgspec_cmd(dir.path())
        .args(["cache", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Graphs: 0"));
}
