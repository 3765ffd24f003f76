//! Configuration handling for dgspec
//!
//! Configuration is stored in `~/.config/dgspec/config.toml` (global). A
//! solution is described by a `dgspec.toml` file found in the current
//! directory or one of its parents.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// File name of a solution file
pub const SOLUTION_FILE: &str = "dgspec.toml";

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Settings for the persistent graph cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Use the SQLite cache when loading graph files
    pub enabled: bool,

    /// Directory holding `graphs.db` (defaults to the user cache directory)
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,

    /// Log filter used when neither RUST_LOG nor --verbose is given
    pub log_level: String,

    /// Cache settings
    pub cache: CacheConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_format: OutputFormat::Text,
            log_level: "warn".to_string(),
            cache: CacheConfig::default(),
        }
    }
}

/// A solution: graph files merged into one restore
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SolutionConfig {
    /// Graph files, relative to the solution file
    pub graphs: Vec<PathBuf>,

    /// Projects to restore in the merged graph
    pub restore: Vec<String>,
}

impl SolutionConfig {
    /// Parses a solution file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read solution file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse solution file: {}", path.display()))?;

        if config.graphs.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "{} lists no graphs",
                path.display()
            ))
            .into());
        }

        Ok(config)
    }

    /// Resolves graph paths against the directory of the solution file
    pub fn graph_paths(&self, solution_file: &Path) -> Vec<PathBuf> {
        let base = solution_file.parent().unwrap_or_else(|| Path::new("."));
        self.graphs.iter().map(|g| base.join(g)).collect()
    }
}

/// Combined configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: GlobalConfig,
}

impl Config {
    /// Loads configuration from the default location
    pub fn load() -> Result<Self> {
        let global = match Self::global_config_dir() {
            Some(dir) => Self::load_global(&dir.join("config.toml"))?,
            None => GlobalConfig::default(),
        };

        Ok(Self { global })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "dgspec", "dgspec").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns the default cache directory
    pub fn default_cache_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "dgspec", "dgspec").map(|dirs| dirs.cache_dir().to_path_buf())
    }

    /// Loads global configuration from a file, defaulting when absent
    pub fn load_global(config_path: &Path) -> Result<GlobalConfig> {
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Cache directory: explicit override, then config, then the user cache directory
    pub fn cache_dir(&self, override_dir: Option<&Path>) -> Option<PathBuf> {
        override_dir
            .map(Path::to_path_buf)
            .or_else(|| self.global.cache.dir.clone())
            .or_else(Self::default_cache_dir)
    }

    /// Finds `dgspec.toml` in `start` or one of its parents
    pub fn find_solution_file(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            let candidate = current.join(SOLUTION_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }

            if !current.pop() {
                return None;
            }
        }
    }
}
