//! Repository management: the base clone, commit enumeration, and the
//! worktree pool.
//!
//! One base clone shares its object database with N cheap worktrees, one per
//! worker. Parallel clones of a large repository would be prohibitively
//! expensive in space and time; a worktree is just a checkout overlay.

pub mod repository;
pub mod worktree;

pub use repository::{CommitInfo, RepositoryManager};
pub use worktree::WorktreeLease;
