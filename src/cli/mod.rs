//! # Command-Line Interface
//!
//! User-facing commands over dependency graph files.
//!
//! ## Commands
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Inspect | Read a graph | `show`, `hash`, `check` |
//! | Query | Walk a graph | `closure`, `parents`, `order` |
//! | Combine | Merge graphs | `merge`, `solution` |
//! | Cache | Graph cache upkeep | `cache status`, `cache clear` |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Logging
//!
//! Logs go to stderr. `-v` enables debug logs, `-vv` trace logs; `RUST_LOG`
//! overrides both.
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod graph_cmd;
mod solution_cmd;
mod cache_cmd;

pub use app::{Cli, Commands, GraphContext, run};
pub use output::{Output, OutputFormat};
