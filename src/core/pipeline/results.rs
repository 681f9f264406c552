//! Result types flowing through the pipeline.
//!
//! A worker turns every dispatched commit into exactly one [`CommitOutcome`].
//! Completed commits also leave a [`CommitReport`] on disk, which is the
//! aggregator's only input for statistics; skipped and failed commits leave
//! only their outcome. This is what makes the batch invariant checkable:
//! for every enumerated commit, a result document exists or an error record
//! exists, never both, never neither.

use serde::{Deserialize, Serialize};

use crate::analyzer::protocol::FileReport;

/// The persisted per-commit document, `pmd_results/<commit>.json`.
///
/// `files` follows PMD's report convention: only files with at least one
/// violation appear. `num_java_files` records the full discovered count,
/// which the aggregator needs for its averages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommitReport {
    /// Commit hash this document describes.
    pub commit: String,

    /// Parent commit hash; `null` for the root commit.
    pub parent: Option<String>,

    /// Number of `.java` files discovered at this commit.
    pub num_java_files: usize,

    /// Per-file findings, sorted by file path; violations within a file are
    /// sorted by begin line, then rule name.
    pub files: Vec<FileReport>,
}

impl CommitReport {
    /// Total findings across all files.
    pub fn num_warnings(&self) -> usize {
        self.files.iter().map(|f| f.violations.len()).sum()
    }
}

/// What one dispatched commit came to.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// The commit was analyzed and its document persisted.
    Completed(CommitStats),

    /// Checkout or discovery failed; the commit was not analyzed.
    Skipped {
        /// Commit hash.
        hash: String,
        /// Why the commit was skipped.
        reason: String,
    },

    /// The analyzer rejected or failed the commit's request.
    Failed {
        /// Commit hash.
        hash: String,
        /// Why the analysis failed.
        reason: String,
    },
}

impl CommitOutcome {
    /// Commit hash this outcome belongs to.
    pub fn hash(&self) -> &str {
        match self {
            Self::Completed(stats) => &stats.hash,
            Self::Skipped { hash, .. } | Self::Failed { hash, .. } => hash,
        }
    }
}

/// Lightweight statistics a worker reports back for a completed commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitStats {
    /// Commit hash.
    pub hash: String,
    /// Number of `.java` files discovered.
    pub num_java_files: usize,
    /// Total findings persisted for this commit.
    pub num_warnings: usize,
}

/// Final account of one batch.
#[derive(Debug)]
pub struct BatchReport {
    /// Commits enumerated at batch start.
    pub total_commits: usize,

    /// Hashes of commits that completed, in enumeration order.
    pub completed: Vec<String>,

    /// Skipped/failed commits and their reasons, keyed by hash.
    pub errors: std::collections::BTreeMap<String, String>,

    /// Whether the batch was cancelled before draining the queue.
    pub interrupted: bool,
}

impl BatchReport {
    /// Exit code reflecting the worst outcome observed.
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            130
        } else if !self.errors.is_empty() {
            5
        } else {
            0
        }
    }
}
