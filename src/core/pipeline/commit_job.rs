//! The per-commit job: everything that happens to one commit inside one
//! worker.
//!
//! Checkout and discovery failures mark the commit skipped; analyzer
//! failures mark it failed; neither aborts the batch. A persist failure is
//! a disk problem and is fatal. The persisted document is canonically
//! ordered (file path, begin line, rule name) so diffs between adjacent
//! commits are stable and parallel runs are byte-reproducible.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::analyzer::client::AnalyzerClient;
use crate::analyzer::protocol::{AnalyzeRequest, FileReport, Finding};
use crate::core::errors::{MinerError, Result};
use crate::core::pipeline::discovery::{self, SourceFile};
use crate::core::pipeline::results::{CommitOutcome, CommitReport, CommitStats};
use crate::git::repository::CommitInfo;
use crate::git::worktree::WorktreeLease;
use crate::io::cache::{CacheKey, FileHashCache};
use crate::io::persist;

/// Everything a commit job needs beyond the commit itself. Shared by all
/// workers for the lifetime of the batch.
pub struct CommitJobContext {
    /// Absolute path of the ruleset XML, as sent to the analyzer.
    pub ruleset_path: String,
    /// Content hash of the ruleset, the cache key's second half.
    pub ruleset_id: String,
    /// Pre-joined aux classpath, when configured.
    pub aux_classpath: Option<String>,
    /// Directory per-commit documents are written to.
    pub results_dir: PathBuf,
    /// Shared finding cache.
    pub cache: Arc<FileHashCache>,
    /// Shared analyzer client.
    pub client: Arc<AnalyzerClient>,
}

/// Run one commit through checkout, discovery, analysis, and persistence.
///
/// Returns `Err` only for fatal conditions (persist failures); every
/// per-commit problem is folded into the returned outcome.
pub async fn run_commit(
    ctx: &CommitJobContext,
    lease: &WorktreeLease,
    commit: &CommitInfo,
) -> Result<CommitOutcome> {
    let hash = commit.hash.clone();

    // Steps 1-2: checkout and discovery, blocking work off the runtime.
    let discovered = {
        let lease = lease.clone();
        let hash = hash.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<SourceFile>> {
            lease.checkout(&hash)?;
            discovery::discover_java_files(&lease.path)
        })
        .await
        .map_err(|e| MinerError::pipeline("commit-job", format!("checkout task panicked: {e}")))?
    };

    let files = match discovered {
        Ok(files) => files,
        Err(e) => {
            warn!("Skipping commit {hash}: {e}");
            return Ok(CommitOutcome::Skipped {
                hash,
                reason: e.to_string(),
            });
        }
    };

    // Step 3: classify against the cache.
    let mut findings_by_file: BTreeMap<String, Vec<Finding>> = BTreeMap::new();
    let mut misses: Vec<SourceFile> = Vec::new();
    for file in &files {
        let key = CacheKey::new(file.content_hash.clone(), ctx.ruleset_id.clone());
        match ctx.cache.get(&key) {
            Some(cached) => {
                findings_by_file.insert(file.rel_path.clone(), cached.as_ref().clone());
            }
            None => misses.push(file.clone()),
        }
    }
    debug!(
        "Commit {hash}: {} java files, {} cache hits, {} to analyze",
        files.len(),
        files.len() - misses.len(),
        misses.len()
    );

    // Step 4: one analyzer call for the miss set; none at all when it is
    // empty (the fast path for unchanged commits).
    if !misses.is_empty() {
        let request = AnalyzeRequest {
            path: lease.path.display().to_string(),
            ruleset: ctx.ruleset_path.clone(),
            aux_classpath: ctx.aux_classpath.clone(),
            files: Some(misses.iter().map(|f| f.rel_path.clone()).collect()),
        };

        let report = match ctx.client.analyze(&request).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Analysis of commit {hash} failed: {e}");
                return Ok(CommitOutcome::Failed {
                    hash,
                    reason: e.to_string(),
                });
            }
        };

        // Step 5: attribute fresh findings to their worktree-relative path.
        let miss_paths: HashSet<&str> = misses.iter().map(|f| f.rel_path.as_str()).collect();
        let mut fresh: BTreeMap<String, Vec<Finding>> = BTreeMap::new();
        for file_report in report.files {
            let rel = normalize_report_path(&file_report.filename, &lease.path);
            if miss_paths.contains(rel.as_str()) {
                fresh.entry(rel).or_default().extend(file_report.violations);
            } else {
                debug!("Ignoring findings for unrequested file {rel}");
            }
        }
        for processing_error in &report.processing_errors {
            warn!(
                "Analyzer could not process {} at commit {hash}: {}",
                processing_error.filename, processing_error.message
            );
        }

        // Step 6: populate the cache for every miss, empty lists included,
        // otherwise the miss would repeat at the next commit.
        for miss in &misses {
            let findings = fresh.remove(&miss.rel_path).unwrap_or_default();
            let key = CacheKey::new(miss.content_hash.clone(), ctx.ruleset_id.clone());
            findings_by_file.insert(miss.rel_path.clone(), findings.clone());
            ctx.cache.put(key, findings);
        }
    }

    // Step 7: canonical ordering, then atomic persist. The aggregator must
    // never observe a partial document.
    let report = build_commit_report(commit, files.len(), findings_by_file);
    let stats = CommitStats {
        hash: report.commit.clone(),
        num_java_files: report.num_java_files,
        num_warnings: report.num_warnings(),
    };

    let path = ctx.results_dir.join(format!("{hash}.json"));
    tokio::task::spawn_blocking(move || persist::write_json_atomic(&path, &report))
        .await
        .map_err(|e| MinerError::pipeline("commit-job", format!("persist task panicked: {e}")))??;

    Ok(CommitOutcome::Completed(stats))
}

/// Assemble the persisted document with its contractual ordering: files by
/// path (the map is already sorted), violations by begin line then rule.
fn build_commit_report(
    commit: &CommitInfo,
    num_java_files: usize,
    findings_by_file: BTreeMap<String, Vec<Finding>>,
) -> CommitReport {
    let files = findings_by_file
        .into_iter()
        .filter(|(_, violations)| !violations.is_empty())
        .map(|(filename, mut violations)| {
            violations.sort_by(|a, b| {
                a.beginline
                    .cmp(&b.beginline)
                    .then_with(|| a.rule.cmp(&b.rule))
            });
            FileReport {
                filename,
                violations,
            }
        })
        .collect();

    CommitReport {
        commit: commit.hash.clone(),
        parent: commit.parent.clone(),
        num_java_files,
        files,
    }
}

/// Reduce a path from the analyzer's report to a worktree-relative one.
///
/// PMD reports absolute paths when given absolute input paths; the cache is
/// content-addressed by relative path so both spellings must collapse.
fn normalize_report_path(reported: &str, worktree_root: &Path) -> String {
    let path = Path::new(reported);
    let stripped = path.strip_prefix(worktree_root).unwrap_or(path);
    let as_string = stripped
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    as_string
        .strip_prefix("./")
        .map(str::to_string)
        .unwrap_or(as_string)
}
