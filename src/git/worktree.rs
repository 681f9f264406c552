//! Worktree pool: acquisition, detached checkout, and reclamation.
//!
//! Each worker holds exactly one worktree for the lifetime of the batch and
//! moves it from commit to commit. Acquisition must succeed over residue
//! from an aborted prior run: the stale administrative entry is pruned, the
//! helper branch deleted, and any leftover directory removed before the
//! fresh worktree is added.

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use git2::build::CheckoutBuilder;
use git2::{BranchType, ErrorCode, Oid, Repository, WorktreePruneOptions};
use tracing::{debug, warn};

use crate::core::errors::{MinerError, Result};
use crate::git::repository::RepositoryManager;

/// Checkout retries tolerated under object-database lock contention.
const CHECKOUT_LOCK_RETRIES: u32 = 3;

/// Base sleep between contended checkout attempts; a sub-100 ms jitter is
/// added so workers do not retry in lockstep.
const CHECKOUT_RETRY_BASE: Duration = Duration::from_millis(200);

/// A worktree leased to one worker for the duration of a batch.
#[derive(Debug, Clone)]
pub struct WorktreeLease {
    /// Administrative name of the worktree (`wt_<worker_id>`).
    pub name: String,
    /// Absolute path of the checkout directory.
    pub path: PathBuf,
    /// Worker the lease belongs to.
    pub worker_id: usize,
}

impl WorktreeLease {
    /// Move this worktree to `commit_hash` with a forced, detached checkout.
    ///
    /// HEAD is detached (a branch ref is never updated) and untracked and
    /// ignored residue from the previous commit is removed, so file
    /// enumeration at the new commit sees exactly the committed tree.
    pub fn checkout(&self, commit_hash: &str) -> Result<()> {
        let mut attempt = 0;
        loop {
            match try_checkout(&self.path, commit_hash) {
                Ok(()) => {
                    debug!("Checked out {commit_hash} in {}", self.name);
                    return Ok(());
                }
                Err(e) if is_lock_contention(&e) && attempt < CHECKOUT_LOCK_RETRIES => {
                    attempt += 1;
                    let backoff = CHECKOUT_RETRY_BASE + jitter_under_100ms();
                    debug!(
                        "Checkout of {commit_hash} contended (attempt {attempt}); retrying in {} ms",
                        backoff.as_millis()
                    );
                    thread::sleep(backoff);
                }
                Err(e) => {
                    return Err(MinerError::checkout(commit_hash, e.message().to_string()));
                }
            }
        }
    }
}

fn try_checkout(worktree_path: &std::path::Path, commit_hash: &str) -> std::result::Result<(), git2::Error> {
    let repo = Repository::open(worktree_path)?;
    let oid = Oid::from_str(commit_hash)?;
    let commit = repo.find_commit(oid)?;

    let mut checkout = CheckoutBuilder::new();
    checkout
        .force()
        .remove_untracked(true)
        .remove_ignored(true);

    repo.checkout_tree(commit.as_object(), Some(&mut checkout))?;
    repo.set_head_detached(oid)?;
    Ok(())
}

fn is_lock_contention(e: &git2::Error) -> bool {
    e.code() == ErrorCode::Locked || e.message().contains("lock")
}

fn jitter_under_100ms() -> Duration {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    Duration::from_millis(u64::from(nanos % 100))
}

impl RepositoryManager {
    /// Create a fresh worktree for `worker_id`, reclaiming any stale state a
    /// prior aborted run left behind.
    pub fn acquire_worktree(&self, worker_id: usize) -> Result<WorktreeLease> {
        let name = format!("wt_{worker_id}");
        let path = self.worktrees_root().join(&name);

        self.with_repo(|repo| -> Result<()> {
            prune_worktree_entry(repo, &name);
            delete_helper_branch(repo, &name);

            if path.exists() {
                warn!("Removing residual worktree directory {}", path.display());
                fs::remove_dir_all(&path).map_err(|e| {
                    MinerError::io(
                        format!("Failed to remove stale worktree: {}", path.display()),
                        e,
                    )
                })?;
            }

            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    MinerError::io(
                        format!("Failed to create worktree root: {}", parent.display()),
                        e,
                    )
                })?;
            }

            repo.worktree(&name, &path, None).map_err(|e| {
                MinerError::repository_from(format!("failed to add worktree {name}"), e)
            })?;
            Ok(())
        })?;

        // Detach immediately so no branch ref is ever HEAD of a worktree.
        let worktree_repo = Repository::open(&path).map_err(|e| {
            MinerError::repository_from(format!("failed to open new worktree {name}"), e)
        })?;
        if let Some(target) = worktree_repo.head().ok().and_then(|h| h.target()) {
            worktree_repo.set_head_detached(target).map_err(|e| {
                MinerError::repository_from(format!("failed to detach HEAD in {name}"), e)
            })?;
        }

        debug!("Acquired worktree {name} at {}", path.display());
        let lease = WorktreeLease {
            name,
            path,
            worker_id,
        };
        self.register_lease(lease.clone());
        Ok(lease)
    }

    /// Remove every leased worktree, prune its administrative entry, and
    /// delete its helper branch. Failures are logged and skipped; an
    /// abnormal shutdown is repaired by the next batch's acquisition.
    pub fn release_all(&self) {
        for lease in self.lease_snapshot() {
            if lease.path.exists() {
                if let Err(e) = fs::remove_dir_all(&lease.path) {
                    warn!(
                        "Could not remove worktree {} ({e}); manual cleanup may be required",
                        lease.path.display()
                    );
                }
            }
            self.with_repo(|repo| {
                prune_worktree_entry(repo, &lease.name);
                delete_helper_branch(repo, &lease.name);
            });
            debug!("Released worktree {}", lease.name);
        }
    }
}

fn prune_worktree_entry(repo: &Repository, name: &str) {
    if let Ok(worktree) = repo.find_worktree(name) {
        let mut opts = WorktreePruneOptions::new();
        opts.valid(true).locked(true).working_tree(true);
        if let Err(e) = worktree.prune(Some(&mut opts)) {
            warn!("Could not prune worktree entry {name}: {e}");
        }
    }
}

fn delete_helper_branch(repo: &Repository, name: &str) {
    if let Ok(mut branch) = repo.find_branch(name, BranchType::Local) {
        if let Err(e) = branch.delete() {
            warn!("Could not delete helper branch {name}: {e}");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::commit_file;
    use super::*;

    use crate::git::repository::RepositoryManager;

    fn fixture() -> (tempfile::TempDir, tempfile::TempDir, RepositoryManager, Vec<String>) {
        let repo_dir = tempfile::tempdir().unwrap();
        let work_dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(repo_dir.path()).unwrap();
        let c1 = commit_file(&repo, "src/A.java", "class A { int a; }", "add A");
        let c2 = commit_file(&repo, "src/B.java", "class B {}", "add B");

        let (manager, commits) = RepositoryManager::initialize(
            repo_dir.path().to_str().unwrap(),
            work_dir.path(),
            &work_dir.path().join("worktrees"),
        )
        .unwrap();
        assert_eq!(
            commits.iter().map(|c| c.hash.clone()).collect::<Vec<_>>(),
            vec![c1.clone(), c2.clone()]
        );
        (repo_dir, work_dir, manager, vec![c1, c2])
    }

    #[test]
    fn acquire_checkout_and_release() {
        let (_repo_dir, work_dir, manager, commits) = fixture();

        let lease = manager.acquire_worktree(0).unwrap();
        assert!(lease.path.is_dir());

        lease.checkout(&commits[0]).unwrap();
        assert!(lease.path.join("src/A.java").is_file());
        assert!(!lease.path.join("src/B.java").exists());

        lease.checkout(&commits[1]).unwrap();
        assert!(lease.path.join("src/B.java").is_file());

        manager.release_all();
        assert!(!work_dir.path().join("worktrees/wt_0").exists());
    }

    #[test]
    fn checkout_removes_untracked_residue() {
        let (_repo_dir, _work_dir, manager, commits) = fixture();
        let lease = manager.acquire_worktree(0).unwrap();

        lease.checkout(&commits[1]).unwrap();
        std::fs::write(lease.path.join("src/Residue.java"), "class Residue {}").unwrap();

        lease.checkout(&commits[0]).unwrap();
        assert!(!lease.path.join("src/Residue.java").exists());

        manager.release_all();
    }

    #[test]
    fn checkout_detaches_head() {
        let (_repo_dir, _work_dir, manager, commits) = fixture();
        let lease = manager.acquire_worktree(0).unwrap();
        lease.checkout(&commits[0]).unwrap();

        let worktree_repo = Repository::open(&lease.path).unwrap();
        assert!(worktree_repo.head_detached().unwrap());

        manager.release_all();
    }

    #[test]
    fn acquire_survives_stale_worktree_from_aborted_run() {
        let (repo_dir, work_dir, manager, commits) = fixture();

        let lease = manager.acquire_worktree(0).unwrap();
        lease.checkout(&commits[0]).unwrap();
        // Simulate an abnormal shutdown: drop the manager without release.
        drop(manager);

        let (manager2, _) = RepositoryManager::initialize(
            repo_dir.path().to_str().unwrap(),
            work_dir.path(),
            &work_dir.path().join("worktrees"),
        )
        .unwrap();
        let lease2 = manager2.acquire_worktree(0).unwrap();
        lease2.checkout(&commits[1]).unwrap();
        assert!(lease2.path.join("src/B.java").is_file());

        manager2.release_all();
    }

    #[test]
    fn checkout_of_unknown_commit_fails_cleanly() {
        let (_repo_dir, _work_dir, manager, _commits) = fixture();
        let lease = manager.acquire_worktree(0).unwrap();

        let err = lease
            .checkout("0123456789abcdef0123456789abcdef01234567")
            .unwrap_err();
        assert!(matches!(err, MinerError::Checkout { .. }));

        manager.release_all();
    }

    #[test]
    fn leases_are_partitioned_per_worker() {
        let (_repo_dir, _work_dir, manager, commits) = fixture();
        let lease_a = manager.acquire_worktree(0).unwrap();
        let lease_b = manager.acquire_worktree(1).unwrap();
        assert_ne!(lease_a.path, lease_b.path);

        lease_a.checkout(&commits[0]).unwrap();
        lease_b.checkout(&commits[1]).unwrap();
        assert!(!lease_a.path.join("src/B.java").exists());
        assert!(lease_b.path.join("src/B.java").is_file());

        manager.release_all();
    }
}
