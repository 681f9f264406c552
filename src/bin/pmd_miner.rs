//! PMD Miner CLI - commit-history static analysis for Java repositories.
//!
//! Drives the mining pipeline from the command line: per-commit PMD
//! findings under `pmd_results/`, a repository summary in `summary.json`,
//! and exit codes that reflect the worst outcome the batch observed.

use clap::Parser;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else if cli.quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let code = cli::mine_command(cli).await;
    std::process::exit(code);
}
