//! Batch orchestration: setup, worker fan-out, and teardown.
//!
//! Commits are dispatched oldest-first through one bounded FIFO channel
//! (backpressure at 4× the worker count) and complete in whatever order the
//! worktrees progress. Workers observe cancellation between commits only,
//! so every per-commit document is either fully written or absent. Fatal
//! errors from one worker let the others drain before the batch reports.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::analyzer::client::AnalyzerClient;
use crate::analyzer::daemon::AnalyzerDaemon;
use crate::core::config::MinerConfig;
use crate::core::errors::{MinerError, Result};
use crate::core::pipeline::commit_job::{self, CommitJobContext};
use crate::core::pipeline::results::{BatchReport, CommitOutcome};
use crate::core::pipeline::summary;
use crate::git::repository::{CommitInfo, RepositoryManager};
use crate::io::cache::{self, FileHashCache};

/// Queue slots per worker before the producer blocks.
const QUEUE_SLOTS_PER_WORKER: usize = 4;

/// Progress callback: `(completed_commits, total_commits)`.
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// The mining pipeline for one batch.
pub struct MiningPipeline {
    config: MinerConfig,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for MiningPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiningPipeline")
            .field("config", &self.config)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl MiningPipeline {
    /// Create a pipeline after validating the configuration.
    pub fn new(config: MinerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            progress: None,
        })
    }

    /// Attach a progress callback, invoked once per completed commit.
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Run the batch to completion (or cancellation).
    ///
    /// `cancel` is the single cancellation signal: once set, the queue
    /// closes, in-flight workers finish their current commit and exit,
    /// worktrees are reclaimed, and no summary is written.
    pub async fn run(&self, cancel: Arc<AtomicBool>) -> Result<BatchReport> {
        self.prepare_output_layout()?;

        let (manager, commits) = self.initialize_repository().await?;
        let manager = Arc::new(manager);
        let total = commits.len();

        if commits.is_empty() {
            info!("Repository has no commits; writing empty summary");
            let errors = BTreeMap::new();
            summary::write_summary(
                &self.absolute_output_dir()?,
                &self.config.results_dir(),
                &[],
                &errors,
            )?;
            return Ok(BatchReport {
                total_commits: 0,
                completed: Vec::new(),
                errors,
                interrupted: false,
            });
        }

        // The daemon (when supervised) must be up before the readiness gate.
        let daemon = self.spawn_daemon()?;
        let client = Arc::new(AnalyzerClient::new(self.config.analyzer.clone())?);
        client.wait_until_ready().await?;

        let cache = Arc::new(self.load_cache());
        let context = Arc::new(self.build_job_context(cache.clone(), client)?);

        let outcomes = self
            .run_workers(manager.clone(), &commits, context, cancel.clone())
            .await;

        // Teardown happens regardless of how the fan-out ended.
        let release_manager = manager.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || release_manager.release_all()).await {
            warn!("Worktree release task panicked: {e}");
        }
        if let Some(daemon) = daemon {
            daemon.shutdown().await;
        }

        let (collected, fatal) = outcomes?;
        if let Some(fatal) = fatal {
            return Err(fatal);
        }

        let (completed, errors) = partition_outcomes(&commits, &collected);

        if cancel.load(Ordering::SeqCst) {
            info!(
                "Batch interrupted: {}/{} commits completed; no summary written",
                completed.len(),
                total
            );
            return Ok(BatchReport {
                total_commits: total,
                completed,
                errors,
                interrupted: true,
            });
        }

        if self.config.cache.persist {
            if let Err(e) = cache.save(&self.config.cache_path()) {
                warn!("Could not persist finding cache: {e}");
            }
        }

        summary::write_summary(
            &self.absolute_output_dir()?,
            &self.config.results_dir(),
            &completed,
            &errors,
        )?;

        Ok(BatchReport {
            total_commits: total,
            completed,
            errors,
            interrupted: false,
        })
    }

    fn prepare_output_layout(&self) -> Result<()> {
        for dir in [
            self.config.output_dir.clone(),
            self.config.results_dir(),
            self.config.worktrees_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| {
                MinerError::io(format!("Failed to create directory: {}", dir.display()), e)
            })?;
        }
        Ok(())
    }

    fn absolute_output_dir(&self) -> Result<std::path::PathBuf> {
        fs::canonicalize(&self.config.output_dir).map_err(|e| {
            MinerError::io(
                format!(
                    "Output directory not accessible: {}",
                    self.config.output_dir.display()
                ),
                e,
            )
        })
    }

    async fn initialize_repository(&self) -> Result<(RepositoryManager, Vec<CommitInfo>)> {
        let repo_location = self.config.repo_location.clone();
        let repo_base = self.config.repo_base_dir();
        let worktrees_root = self.config.worktrees_dir();

        tokio::task::spawn_blocking(move || {
            RepositoryManager::initialize(&repo_location, &repo_base, &worktrees_root)
        })
        .await
        .map_err(|e| MinerError::pipeline("setup", format!("repository task panicked: {e}")))?
    }

    fn spawn_daemon(&self) -> Result<Option<AnalyzerDaemon>> {
        match &self.config.analyzer.spawn_command {
            Some(command) => Ok(Some(AnalyzerDaemon::spawn(command)?)),
            None => Ok(None),
        }
    }

    fn load_cache(&self) -> FileHashCache {
        if self.config.cache.persist {
            FileHashCache::load(&self.config.cache_path())
        } else {
            FileHashCache::new()
        }
    }

    fn build_job_context(
        &self,
        cache: Arc<FileHashCache>,
        client: Arc<AnalyzerClient>,
    ) -> Result<CommitJobContext> {
        let ruleset_path = fs::canonicalize(&self.config.ruleset).map_err(|e| {
            MinerError::io(
                format!("Ruleset not accessible: {}", self.config.ruleset.display()),
                e,
            )
        })?;
        let ruleset_id = cache::hash_file(&ruleset_path)?;

        Ok(CommitJobContext {
            ruleset_path: ruleset_path.display().to_string(),
            ruleset_id,
            aux_classpath: self.config.joined_aux_classpath(),
            results_dir: self.config.results_dir(),
            cache,
            client,
        })
    }

    /// Fan the commit list out across the worker pool and collect outcomes.
    ///
    /// Returns the collected outcomes plus the first fatal worker error, if
    /// any. Workers that hit fatal errors exit early; the rest drain.
    async fn run_workers(
        &self,
        manager: Arc<RepositoryManager>,
        commits: &[CommitInfo],
        context: Arc<CommitJobContext>,
        cancel: Arc<AtomicBool>,
    ) -> Result<(Vec<CommitOutcome>, Option<MinerError>)> {
        let workers = self.config.workers;
        let total = commits.len();
        info!("Starting analysis with {workers} workers over {total} commits");

        let (commit_tx, commit_rx) = mpsc::channel::<CommitInfo>(workers * QUEUE_SLOTS_PER_WORKER);
        let commit_rx = Arc::new(Mutex::new(commit_rx));
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<CommitOutcome>();

        let mut worker_handles: Vec<JoinHandle<Result<()>>> = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            worker_handles.push(tokio::spawn(worker_loop(
                worker_id,
                manager.clone(),
                context.clone(),
                commit_rx.clone(),
                outcome_tx.clone(),
                cancel.clone(),
            )));
        }
        drop(outcome_tx);

        let producer_cancel = cancel.clone();
        let dispatch: Vec<CommitInfo> = commits.to_vec();
        let producer: JoinHandle<()> = tokio::spawn(async move {
            for commit in dispatch {
                if producer_cancel.load(Ordering::SeqCst) {
                    debug!("Dispatch cancelled");
                    break;
                }
                if commit_tx.send(commit).await.is_err() {
                    // Every worker has exited; nothing left to feed.
                    break;
                }
            }
        });

        let mut collected = Vec::with_capacity(total);
        while let Some(outcome) = outcome_rx.recv().await {
            debug!("Commit {} finished", outcome.hash());
            collected.push(outcome);
            if let Some(progress) = &self.progress {
                progress(collected.len(), total);
            }
        }

        if let Err(e) = producer.await {
            warn!("Dispatch task panicked: {e}");
        }

        let mut fatal = None;
        for handle in worker_handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("Worker failed: {e}");
                    if fatal.is_none() {
                        fatal = Some(e);
                    }
                }
                Err(e) => {
                    error!("Worker panicked: {e}");
                    if fatal.is_none() {
                        fatal = Some(MinerError::pipeline(
                            "worker",
                            format!("worker task panicked: {e}"),
                        ));
                    }
                }
            }
        }

        Ok((collected, fatal))
    }
}

/// One worker: lease a worktree, then pull commits until the queue closes,
/// cancellation is observed, or a fatal error strikes.
async fn worker_loop(
    worker_id: usize,
    manager: Arc<RepositoryManager>,
    context: Arc<CommitJobContext>,
    queue: Arc<Mutex<mpsc::Receiver<CommitInfo>>>,
    outcomes: mpsc::UnboundedSender<CommitOutcome>,
    cancel: Arc<AtomicBool>,
) -> Result<()> {
    let lease = {
        let manager = manager.clone();
        tokio::task::spawn_blocking(move || manager.acquire_worktree(worker_id))
            .await
            .map_err(|e| {
                MinerError::pipeline("worker", format!("acquire task panicked: {e}"))
            })??
    };
    debug!("Worker {worker_id} holds worktree {}", lease.name);

    loop {
        // Cancellation is only observed between commits, never mid-commit.
        if cancel.load(Ordering::SeqCst) {
            debug!("Worker {worker_id} observed cancellation");
            break;
        }

        let commit = {
            let mut queue = queue.lock().await;
            queue.recv().await
        };
        let Some(commit) = commit else {
            break;
        };

        let outcome = match commit_job::run_commit(&context, &lease, &commit).await {
            Ok(outcome) => outcome,
            Err(fatal) => {
                // Disk problems and the like: this worker stops, the others
                // drain, and the batch surfaces the error after teardown.
                cancel.store(true, Ordering::SeqCst);
                return Err(fatal);
            }
        };
        let _ = outcomes.send(outcome);
    }

    Ok(())
}

/// Split collected outcomes into completed hashes (enumeration order) and
/// an error map keyed by commit hash.
fn partition_outcomes(
    commits: &[CommitInfo],
    outcomes: &[CommitOutcome],
) -> (Vec<String>, BTreeMap<String, String>) {
    let mut completed_set = HashSet::new();
    let mut errors = BTreeMap::new();

    for outcome in outcomes {
        match outcome {
            CommitOutcome::Completed(stats) => {
                completed_set.insert(stats.hash.clone());
            }
            CommitOutcome::Skipped { hash, reason } => {
                errors.insert(hash.clone(), format!("skipped: {reason}"));
            }
            CommitOutcome::Failed { hash, reason } => {
                errors.insert(hash.clone(), format!("failed: {reason}"));
            }
        }
    }

    let completed = commits
        .iter()
        .map(|c| c.hash.clone())
        .filter(|hash| completed_set.contains(hash))
        .collect();
    (completed, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::results::CommitStats;

    fn commit(hash: &str, epoch: i64) -> CommitInfo {
        CommitInfo {
            hash: hash.into(),
            parent: None,
            author_epoch: epoch,
        }
    }

    #[test]
    fn partition_keeps_enumeration_order() {
        let commits = vec![commit("a", 1), commit("b", 2), commit("c", 3)];
        let outcomes = vec![
            CommitOutcome::Completed(CommitStats {
                hash: "c".into(),
                num_java_files: 1,
                num_warnings: 0,
            }),
            CommitOutcome::Failed {
                hash: "b".into(),
                reason: "analyzer 500".into(),
            },
            CommitOutcome::Completed(CommitStats {
                hash: "a".into(),
                num_java_files: 1,
                num_warnings: 2,
            }),
        ];

        let (completed, errors) = partition_outcomes(&commits, &outcomes);
        assert_eq!(completed, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(
            errors.get("b").map(String::as_str),
            Some("failed: analyzer 500")
        );
    }

    #[test]
    fn pipeline_rejects_invalid_configuration() {
        let config = MinerConfig::new("repo", "/missing/ruleset.xml", "/tmp/out");
        let err = MiningPipeline::new(config).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
