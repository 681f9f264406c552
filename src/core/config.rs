//! Configuration types for a mining batch.
//!
//! One [`MinerConfig`] describes one end-to-end batch: which repository to
//! mine, which ruleset to apply, where results land, and how the analyzer
//! daemon is reached. Validation happens once, before any work starts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{MinerError, Result};

/// Default analyzer endpoint when none is configured.
pub const DEFAULT_ANALYZER_URL: &str = "http://127.0.0.1:8000";

/// Top-level configuration for one mining batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerConfig {
    /// Git URL or local path of the repository to mine.
    pub repo_location: String,

    /// Path to the PMD ruleset XML.
    pub ruleset: PathBuf,

    /// Output root; per-commit results, the summary, the base clone, and
    /// worktrees all live beneath it.
    pub output_dir: PathBuf,

    /// Number of parallel workers. Defaults to the number of hardware cores.
    pub workers: usize,

    /// Extra classpath entries forwarded to the analyzer, joined with the
    /// platform path separator.
    #[serde(default)]
    pub aux_classpath: Vec<PathBuf>,

    /// Analyzer daemon settings.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Finding cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Settings for reaching (and optionally supervising) the analyzer daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Base URL of the analyzer's HTTP endpoint.
    pub base_url: String,

    /// Command line to spawn the daemon as a child process. When absent the
    /// daemon is assumed to be externally managed.
    #[serde(default)]
    pub spawn_command: Option<String>,

    /// Total readiness-probe deadline in milliseconds.
    pub readiness_timeout_ms: u64,

    /// Per-request deadline in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ANALYZER_URL.to_string(),
            spawn_command: None,
            readiness_timeout_ms: 30_000,
            request_timeout_ms: 600_000,
        }
    }
}

impl AnalyzerConfig {
    /// Readiness-probe deadline as a [`Duration`].
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    /// Per-request deadline as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Settings for the persistent finding cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Load `cache.bin` at batch start and write it back after a completed
    /// batch. The in-memory cache is always active regardless.
    pub persist: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { persist: true }
    }
}

impl MinerConfig {
    /// Create a configuration with defaults for everything beyond the three
    /// required inputs.
    pub fn new(
        repo_location: impl Into<String>,
        ruleset: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repo_location: repo_location.into(),
            ruleset: ruleset.into(),
            output_dir: output_dir.into(),
            workers: default_workers(),
            aux_classpath: Vec::new(),
            analyzer: AnalyzerConfig::default(),
            cache: CacheConfig::default(),
        }
    }

    /// Validate the configuration before the batch starts.
    pub fn validate(&self) -> Result<()> {
        if self.repo_location.trim().is_empty() {
            return Err(MinerError::config_field(
                "repository location must not be empty",
                "repo_location",
            ));
        }

        if !self.ruleset.is_file() {
            return Err(MinerError::config_field(
                format!("ruleset file not found: {}", self.ruleset.display()),
                "ruleset",
            ));
        }

        if self.workers == 0 {
            return Err(MinerError::config_field(
                "worker count must be at least 1",
                "workers",
            ));
        }

        if !self.analyzer.base_url.starts_with("http://")
            && !self.analyzer.base_url.starts_with("https://")
        {
            return Err(MinerError::config_field(
                format!("invalid analyzer URL: {}", self.analyzer.base_url),
                "analyzer.base_url",
            ));
        }

        Ok(())
    }

    /// Directory holding the per-commit result documents.
    pub fn results_dir(&self) -> PathBuf {
        self.output_dir.join("pmd_results")
    }

    /// Path of the aggregate summary document.
    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join("summary.json")
    }

    /// Path of the persistent finding cache.
    pub fn cache_path(&self) -> PathBuf {
        self.output_dir.join("cache.bin")
    }

    /// Root beneath which worker worktrees are created.
    pub fn worktrees_dir(&self) -> PathBuf {
        self.output_dir.join("worktrees")
    }

    /// Directory the base clone lands in when `repo_location` is remote.
    pub fn repo_base_dir(&self) -> PathBuf {
        self.output_dir.join("repo_base")
    }

    /// Aux classpath entries joined with the platform path separator, or
    /// `None` when no entries were configured.
    pub fn joined_aux_classpath(&self) -> Option<String> {
        if self.aux_classpath.is_empty() {
            return None;
        }
        let sep = platform_path_separator();
        Some(
            self.aux_classpath
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(sep),
        )
    }
}

/// Number of hardware cores, falling back to 1 when unknown.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

fn platform_path_separator() -> &'static str {
    if cfg!(windows) {
        ";"
    } else {
        ":"
    }
}
