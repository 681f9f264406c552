//! # PMD Miner: Commit-History Static Analysis
//!
//! Mines a Java source repository's entire commit history and, at every
//! commit, produces a structured record of PMD findings. Results feed
//! repository-mining research: per-commit quality signals for statistics,
//! visualization, or machine-learning pipelines.
//!
//! The pipeline materializes each commit into an isolated git worktree,
//! decides which files actually need re-analysis via a content-addressed
//! finding cache, drives a long-running PMD daemon over HTTP in parallel
//! across workers, persists one JSON document per commit, and folds all
//! outcomes into a repository-level summary.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       CLI (pmd-miner)                      │
//! ├────────────────────────────────────────────────────────────┤
//! │  Pipeline     │  Git          │  Analyzer     │  I/O       │
//! │               │               │               │            │
//! │ • Scheduler   │ • Base clone  │ • HTTP client │ • Cache    │
//! │ • Commit job  │ • Worktrees   │ • Readiness   │ • Atomic   │
//! │ • Aggregator  │ • Checkout    │ • Daemon      │   persist  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//! use pmd_miner::{MinerConfig, MiningPipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MinerConfig::new(
//!         "https://github.com/example/project.git",
//!         "rulesets/quickstart.xml",
//!         "./analysis",
//!     );
//!
//!     let pipeline = MiningPipeline::new(config)?;
//!     let report = pipeline.run(Arc::new(AtomicBool::new(false))).await?;
//!
//!     println!("analyzed {} commits", report.completed.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod analyzer;
pub mod core;
pub mod git;
pub mod io;

pub use crate::analyzer::client::AnalyzerClient;
pub use crate::analyzer::protocol::{AnalyzeRequest, Finding};
pub use crate::core::config::{AnalyzerConfig, CacheConfig, MinerConfig};
pub use crate::core::errors::{MinerError, Result};
pub use crate::core::pipeline::executor::MiningPipeline;
pub use crate::core::pipeline::results::{BatchReport, CommitOutcome, CommitReport};
pub use crate::core::pipeline::summary::Summary;
pub use crate::io::cache::FileHashCache;

/// Library version from Cargo metadata.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
