//! Aggregation of per-commit documents into the repository summary.
//!
//! The aggregator is decoupled from the workers by the filesystem: after the
//! pool drains it reads back every completed commit's document and folds
//! them into `summary.json`. Folding follows enumeration order and keeps
//! totals in integers, so the emitted bytes do not depend on worker count or
//! completion order.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::errors::{MinerError, Result};
use crate::core::pipeline::results::CommitReport;
use crate::io::persist;

/// The persisted aggregate document, `summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    /// Absolute path of the output directory.
    pub location: String,

    /// Repository-level statistics over successful commits.
    pub stat_of_repository: RepositoryStats,

    /// Rule name to total occurrences across all successful commits.
    pub stat_of_warnings: BTreeMap<String, u64>,

    /// Skipped/failed commits and their reasons.
    pub stat_of_errors: BTreeMap<String, String>,
}

/// Statistics block of the summary document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositoryStats {
    /// Count of successfully produced commit results.
    pub number_of_commits: usize,

    /// Mean `.java` file count over successful commits.
    pub avg_of_num_java_files: f64,

    /// Mean finding count over successful commits.
    pub avg_of_num_warnings: f64,
}

/// Fold the completed commits' documents into a summary.
///
/// `completed` must be in enumeration order; the fold follows it so the
/// output is identical regardless of completion order. Averages divide in
/// double precision and an empty batch yields 0.0, not an error.
pub fn build_summary(
    output_dir: &Path,
    results_dir: &Path,
    completed: &[String],
    errors: &BTreeMap<String, String>,
) -> Result<Summary> {
    let mut total_java_files: u64 = 0;
    let mut total_warnings: u64 = 0;
    let mut warnings_by_rule: BTreeMap<String, u64> = BTreeMap::new();

    for hash in completed {
        let report = read_commit_report(results_dir, hash)?;
        total_java_files += report.num_java_files as u64;
        total_warnings += report.num_warnings() as u64;
        for file in &report.files {
            for violation in &file.violations {
                *warnings_by_rule.entry(violation.rule.clone()).or_insert(0) += 1;
            }
        }
    }

    let count = completed.len();
    let (avg_java_files, avg_warnings) = if count == 0 {
        (0.0, 0.0)
    } else {
        (
            total_java_files as f64 / count as f64,
            total_warnings as f64 / count as f64,
        )
    };

    Ok(Summary {
        location: output_dir.display().to_string(),
        stat_of_repository: RepositoryStats {
            number_of_commits: count,
            avg_of_num_java_files: avg_java_files,
            avg_of_num_warnings: avg_warnings,
        },
        stat_of_warnings: warnings_by_rule,
        stat_of_errors: errors.clone(),
    })
}

/// Build and atomically persist the summary document.
pub fn write_summary(
    output_dir: &Path,
    results_dir: &Path,
    completed: &[String],
    errors: &BTreeMap<String, String>,
) -> Result<Summary> {
    let summary = build_summary(output_dir, results_dir, completed, errors)?;
    let path = output_dir.join("summary.json");
    persist::write_json_atomic(&path, &summary)?;
    info!("Summary written to {}", path.display());
    Ok(summary)
}

fn read_commit_report(results_dir: &Path, hash: &str) -> Result<CommitReport> {
    let path = results_dir.join(format!("{hash}.json"));
    let bytes = fs::read(&path).map_err(|e| {
        MinerError::io(format!("Failed to read commit result: {}", path.display()), e)
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|e| MinerError::serialization(format!("commit result {hash}"), e))
}
