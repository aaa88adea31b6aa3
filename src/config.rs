use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::errors::{CodeGraphError, Result};

/// Name of the configuration file stored inside the `.codegraph` directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// Name of the hidden directory used to store CodeGraph metadata.
pub const CODEGRAPH_DIR: &str = ".codegraph";

/// Upper bound on concurrent oracle sessions.
pub const MAX_ORACLE_CONCURRENCY: usize = 4;

/// Configuration for a CodeGraph build.
///
/// Controls which files are scanned, how includes are searched, and how much
/// parallelism the passes use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeGraphConfig {
    /// Schema version of the configuration.
    pub version: u32,
    /// Root directory of the project being analyzed.
    pub root_dir: String,
    /// Glob patterns for files picked up when scanning for seed files.
    pub include: Vec<String>,
    /// Glob patterns for paths that are never in scope (build output, VCS, vendored code).
    pub exclude: Vec<String>,
    /// Root-level directories searched for local includes, relative to the project root.
    pub include_dirs: Vec<String>,
    /// Maximum file size in bytes; larger files are skipped.
    pub max_file_size: u64,
    /// Whether to extract doc comments from source files.
    pub extract_docstrings: bool,
    /// Worker threads for extraction and structural resolution (0 = one per core).
    pub worker_threads: usize,
    /// Concurrent sessions allowed against the definition oracle.
    pub oracle_concurrency: usize,
    /// Per-request oracle timeout in milliseconds.
    pub oracle_timeout_ms: u64,
}

impl Default for CodeGraphConfig {
    fn default() -> Self {
        Self {
            version: 1,
            root_dir: String::new(),
            include: vec![
                "**/*.c".to_string(),
                "**/*.h".to_string(),
                "**/*.cc".to_string(),
                "**/*.cpp".to_string(),
                "**/*.cxx".to_string(),
                "**/*.hh".to_string(),
                "**/*.hpp".to_string(),
                "**/*.hxx".to_string(),
                "**/*.py".to_string(),
            ],
            exclude: vec![
                "target/**".to_string(),
                ".git/**".to_string(),
                ".svn/**".to_string(),
                ".hg/**".to_string(),
                ".codegraph/**".to_string(),
                "node_modules/**".to_string(),
                "vendor/**".to_string(),
                "third_party/**".to_string(),
                "venv/**".to_string(),
                ".venv/**".to_string(),
                "**/__pycache__/**".to_string(),
                "build/**".to_string(),
                "cmake-build-*/**".to_string(),
                "out/**".to_string(),
                "dist/**".to_string(),
            ],
            include_dirs: vec![".".to_string(), "include".to_string(), "src".to_string()],
            max_file_size: 1_048_576,
            extract_docstrings: true,
            worker_threads: 0,
            oracle_concurrency: 2,
            oracle_timeout_ms: 5_000,
        }
    }
}

impl CodeGraphConfig {
    /// Oracle concurrency clamped to `1..=MAX_ORACLE_CONCURRENCY`.
    pub fn effective_oracle_concurrency(&self) -> usize {
        self.oracle_concurrency.clamp(1, MAX_ORACLE_CONCURRENCY)
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms.max(1))
    }
}

/// Returns the path to the `.codegraph` directory within the given project root.
pub fn get_codegraph_dir(project_root: &Path) -> PathBuf {
    project_root.join(CODEGRAPH_DIR)
}

/// Returns the path to the configuration file (`config.json`) within the `.codegraph` directory.
pub fn get_config_path(project_root: &Path) -> PathBuf {
    get_codegraph_dir(project_root).join(CONFIG_FILENAME)
}

/// Loads the configuration from disk.
///
/// If the configuration file does not exist, returns a default configuration
/// with `root_dir` set to the given project root.
pub fn load_config(project_root: &Path) -> Result<CodeGraphConfig> {
    let config_path = get_config_path(project_root);

    if !config_path.exists() {
        return Ok(CodeGraphConfig {
            root_dir: project_root.to_string_lossy().to_string(),
            ..CodeGraphConfig::default()
        });
    }

    let contents = fs::read_to_string(&config_path).map_err(|e| CodeGraphError::Config {
        message: format!(
            "failed to read config file '{}': {}",
            config_path.display(),
            e
        ),
    })?;

    let config: CodeGraphConfig =
        serde_json::from_str(&contents).map_err(|e| CodeGraphError::Config {
            message: format!(
                "failed to parse config file '{}': {}",
                config_path.display(),
                e
            ),
        })?;

    Ok(config)
}

/// Saves the configuration to disk using an atomic write.
///
/// Writes to a temporary file first and then renames it to the final location,
/// ensuring that a partial write never corrupts the configuration.
pub fn save_config(project_root: &Path, config: &CodeGraphConfig) -> Result<()> {
    let codegraph_dir = get_codegraph_dir(project_root);
    fs::create_dir_all(&codegraph_dir).map_err(|e| CodeGraphError::Config {
        message: format!(
            "failed to create codegraph directory '{}': {}",
            codegraph_dir.display(),
            e
        ),
    })?;

    let config_path = get_config_path(project_root);
    let tmp_path = config_path.with_extension("tmp");

    let json = serde_json::to_string_pretty(config).map_err(|e| CodeGraphError::Config {
        message: format!("failed to serialize config: {}", e),
    })?;

    fs::write(&tmp_path, &json).map_err(|e| CodeGraphError::Config {
        message: format!(
            "failed to write temporary config file '{}': {}",
            tmp_path.display(),
            e
        ),
    })?;

    fs::rename(&tmp_path, &config_path).map_err(|e| CodeGraphError::Config {
        message: format!(
            "failed to rename temporary config file '{}' to '{}': {}",
            tmp_path.display(),
            config_path.display(),
            e
        ),
    })?;

    Ok(())
}

fn match_options() -> glob::MatchOptions {
    glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    }
}

/// Returns `true` if the project-relative path matches any exclude pattern.
pub fn is_excluded(file_path: &str, config: &CodeGraphConfig) -> bool {
    config.exclude.iter().any(|pattern_str| {
        Pattern::new(pattern_str)
            .map(|pattern| pattern.matches_with(file_path, match_options()))
            .unwrap_or(false)
    })
}

/// Determines whether a file should be included based on the configuration's
/// include and exclude glob patterns.
///
/// A file is included only if it matches at least one include pattern and
/// does not match any exclude pattern. Exclude patterns take precedence.
pub fn should_include_file(file_path: &str, config: &CodeGraphConfig) -> bool {
    if is_excluded(file_path, config) {
        return false;
    }

    config.include.iter().any(|pattern_str| {
        Pattern::new(pattern_str)
            .map(|pattern| pattern.matches_with(file_path, match_options()))
            .unwrap_or(false)
    })
}
