//! CLI argument structures for the pmd-miner binary.

use clap::Parser;
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Mine a Java repository's commit history with PMD.
#[derive(Parser, Debug)]
#[command(name = "pmd-miner")]
#[command(version = VERSION)]
#[command(about = "Mine a Java repository's commit history with PMD")]
#[command(long_about = "
Analyze every commit of a Java repository with PMD and persist one findings
document per commit plus a repository-level summary.

The analyzer runs as a long-lived HTTP daemon. Point --analyzer-url at a
running daemon, or let pmd-miner supervise one with --analyzer-cmd.

Common Usage:

  # Mine a remote repository with 8 workers
  pmd-miner https://github.com/example/project.git \\
      -r rulesets/quickstart.xml -o ./analysis -w 8

  # Mine a local clone, spawning the daemon for the batch
  pmd-miner ./project -r quickstart.xml -o ./analysis \\
      --analyzer-cmd 'java -jar pmd-daemon.jar --port 8000'

Exit codes: 0 success, 2 bad arguments, 3 repository error,
4 analyzer unreachable, 5 partial failure, 130 interrupted.
")]
pub struct Cli {
    /// Git URL or local path of the repository to mine.
    pub repo_location: String,

    /// Path to the PMD ruleset XML.
    #[arg(short, long, value_name = "PATH")]
    pub ruleset: PathBuf,

    /// Output root for per-commit results and the summary.
    #[arg(short, long, value_name = "PATH")]
    pub output_dir: PathBuf,

    /// Number of parallel workers (default: CPU count).
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Extra classpath entries forwarded to the analyzer.
    #[arg(long, value_name = "JAR", num_args = 1..)]
    pub aux_jars: Vec<PathBuf>,

    /// Base URL of the analyzer daemon.
    #[arg(long, value_name = "URL", default_value = "http://127.0.0.1:8000")]
    pub analyzer_url: String,

    /// Command line to spawn the analyzer daemon for the batch.
    #[arg(long, value_name = "CMD")]
    pub analyzer_cmd: Option<String>,

    /// Do not read or write the persistent finding cache (cache.bin).
    #[arg(long)]
    pub no_cache_persist: bool,

    /// Enable verbose logging for debugging.
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Log warnings and errors only; no progress bar.
    #[arg(short, long)]
    pub quiet: bool,
}
