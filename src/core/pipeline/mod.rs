//! The commit-mining pipeline.
//!
//! Orchestrates one batch end to end: commit enumeration feeds a bounded
//! FIFO queue, workers move their private worktrees from commit to commit
//! and run the per-commit job, and the aggregator folds every outcome into
//! the repository summary.
//!
//! ## Stages
//!
//! 1. **Setup**: base clone, commit enumeration, analyzer readiness gate
//! 2. **Fan-out**: commits dispatched oldest-first across N workers
//! 3. **Per-commit job**: checkout → discover → classify → analyze → persist
//! 4. **Aggregation**: fold successful results into `summary.json`

pub mod commit_job;
pub mod discovery;
pub mod executor;
pub mod results;
pub mod summary;
