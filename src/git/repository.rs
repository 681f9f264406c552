//! Base repository setup and commit enumeration.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use git2::{ErrorCode, Repository};
use tracing::{debug, info, warn};

use crate::core::errors::{MinerError, Result};
use crate::git::worktree::WorktreeLease;

/// One commit of the mined repository, discovered once at batch start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// 40-hex commit hash.
    pub hash: String,
    /// Parent hash; `None` for the root commit.
    pub parent: Option<String>,
    /// Author date in seconds since the epoch, the chronological sort key.
    pub author_epoch: i64,
}

/// Owns the base clone and the pool of worker worktrees.
///
/// The underlying [`Repository`] handle is not `Sync`, so every operation
/// that touches the shared object database goes through one mutex. Those
/// operations are rare (worktree add/prune at batch edges); per-commit
/// checkouts open the worktree's own repository and never take this lock.
pub struct RepositoryManager {
    base_path: PathBuf,
    worktrees_root: PathBuf,
    repo: Mutex<Repository>,
    leases: Mutex<Vec<WorktreeLease>>,
}

impl std::fmt::Debug for RepositoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryManager")
            .field("base_path", &self.base_path)
            .field("worktrees_root", &self.worktrees_root)
            .finish_non_exhaustive()
    }
}

impl RepositoryManager {
    /// Clone or open the repository and enumerate its history.
    ///
    /// A remote URL is cloned into `repo_base_dir` (an existing clone from a
    /// prior run is reused); a local path is used as the base in place.
    /// Returns the manager and all commits reachable from the default
    /// branch's tip, oldest first by author date. An empty repository yields
    /// an empty commit list.
    pub fn initialize(
        repo_location: &str,
        repo_base_dir: &Path,
        worktrees_root: &Path,
    ) -> Result<(Self, Vec<CommitInfo>)> {
        let (repo, base_path) = if is_remote_location(repo_location) {
            open_or_clone(repo_location, repo_base_dir)?
        } else {
            open_local(repo_location)?
        };

        let commits = enumerate_commits(&repo)?;
        info!("Found {} commits to analyze", commits.len());

        // Worktree paths travel into analyzer requests, which require
        // absolute worktree roots.
        fs::create_dir_all(worktrees_root).map_err(|e| {
            MinerError::io(
                format!("Failed to create worktree root: {}", worktrees_root.display()),
                e,
            )
        })?;
        let worktrees_root = fs::canonicalize(worktrees_root).map_err(|e| {
            MinerError::io(
                format!("Worktree root not accessible: {}", worktrees_root.display()),
                e,
            )
        })?;

        let manager = Self {
            base_path,
            worktrees_root,
            repo: Mutex::new(repo),
            leases: Mutex::new(Vec::new()),
        };
        Ok((manager, commits))
    }

    /// Path of the base clone.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Root directory the worker worktrees live under.
    pub(crate) fn worktrees_root(&self) -> &Path {
        &self.worktrees_root
    }

    /// Run `f` with the shared base repository handle.
    pub(crate) fn with_repo<T>(&self, f: impl FnOnce(&Repository) -> T) -> T {
        let repo = self.repo.lock().expect("base repository lock poisoned");
        f(&repo)
    }

    /// Record a handed-out lease for later reclamation.
    pub(crate) fn register_lease(&self, lease: WorktreeLease) {
        self.leases
            .lock()
            .expect("lease registry lock poisoned")
            .push(lease);
    }

    /// Snapshot of all leases handed out so far.
    pub(crate) fn lease_snapshot(&self) -> Vec<WorktreeLease> {
        self.leases
            .lock()
            .expect("lease registry lock poisoned")
            .clone()
    }
}

fn is_remote_location(location: &str) -> bool {
    location.contains("://") || location.starts_with("git@")
}

fn open_or_clone(url: &str, repo_base_dir: &Path) -> Result<(Repository, PathBuf)> {
    if repo_base_dir.join(".git").is_dir() {
        info!("Reusing base clone at {}", repo_base_dir.display());
        let repo = Repository::open(repo_base_dir).map_err(|e| {
            MinerError::repository_from(
                format!("failed to open existing base clone: {}", repo_base_dir.display()),
                e,
            )
        })?;
        fetch_best_effort(&repo);
        return Ok((repo, repo_base_dir.to_path_buf()));
    }

    if repo_base_dir.exists() {
        // Residue from an aborted clone.
        fs::remove_dir_all(repo_base_dir).map_err(|e| {
            MinerError::io(
                format!("Failed to clear partial clone: {}", repo_base_dir.display()),
                e,
            )
        })?;
    }

    info!("Cloning {url} into {}", repo_base_dir.display());
    let repo = Repository::clone(url, repo_base_dir)
        .map_err(|e| MinerError::repository_from(format!("clone of {url} failed"), e))?;
    Ok((repo, repo_base_dir.to_path_buf()))
}

fn open_local(path: &str) -> Result<(Repository, PathBuf)> {
    let base = fs::canonicalize(path)
        .map_err(|_| MinerError::repository(format!("repository path not accessible: {path}")))?;
    let repo = Repository::open(&base).map_err(|e| {
        MinerError::repository_from(format!("failed to open repository at {path}"), e)
    })?;
    Ok((repo, base))
}

fn fetch_best_effort(repo: &Repository) {
    let result = repo
        .find_remote("origin")
        .and_then(|mut remote| remote.fetch(&[] as &[&str], None, None));
    if let Err(e) = result {
        warn!("Fetch of origin failed ({e}); mining the history already present");
    }
}

/// All commits reachable from HEAD, oldest first by author date.
///
/// The sort is stable over the reversed revwalk output, so commits sharing
/// an author timestamp keep their topological order and dispatch is
/// deterministic across runs.
fn enumerate_commits(repo: &Repository) -> Result<Vec<CommitInfo>> {
    match repo.head() {
        Ok(_) => {}
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            debug!("Repository has no commits");
            return Ok(Vec::new());
        }
        Err(e) => return Err(MinerError::repository_from("failed to resolve HEAD", e)),
    }

    let mut walk = repo
        .revwalk()
        .map_err(|e| MinerError::repository_from("failed to start revision walk", e))?;
    walk.push_head()
        .map_err(|e| MinerError::repository_from("failed to push HEAD onto walk", e))?;

    let mut commits = Vec::new();
    for oid in walk {
        let oid = oid.map_err(|e| MinerError::repository_from("revision walk failed", e))?;
        let commit = repo
            .find_commit(oid)
            .map_err(|e| MinerError::repository_from(format!("missing commit {oid}"), e))?;
        commits.push(CommitInfo {
            hash: oid.to_string(),
            parent: commit.parent_id(0).ok().map(|p| p.to_string()),
            author_epoch: commit.author().when().seconds(),
        });
    }

    commits.reverse();
    commits.sort_by_key(|c| c.author_epoch);
    Ok(commits)
}
