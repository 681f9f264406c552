//! Command execution: configuration assembly, cancellation wiring, and
//! exit-code mapping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use console::style;
use tracing::{error, warn};

use pmd_miner::{MinerConfig, MiningPipeline};

use crate::cli::args::Cli;
use crate::cli::output;

/// Run one mining batch and return the process exit code.
pub async fn mine_command(cli: Cli) -> i32 {
    let config = build_config(&cli);

    let pipeline = match MiningPipeline::new(config.clone()) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("{} {e}", style("error:").red().bold());
            return e.exit_code();
        }
    };

    let cancel = Arc::new(AtomicBool::new(false));
    spawn_interrupt_listener(cancel.clone());

    let bar = output::batch_progress_bar(cli.quiet);
    let progress_bar = bar.clone();
    let pipeline = pipeline.with_progress(Box::new(move |completed, total| {
        progress_bar.set_length(total as u64);
        progress_bar.set_position(completed as u64);
    }));

    match pipeline.run(cancel).await {
        Ok(report) => {
            bar.finish_and_clear();
            output::print_batch_report(&report, &config.summary_path(), cli.quiet);
            report.exit_code()
        }
        Err(e) => {
            bar.finish_and_clear();
            error!("Batch aborted: {e}");
            e.exit_code()
        }
    }
}

fn build_config(cli: &Cli) -> MinerConfig {
    let mut config = MinerConfig::new(
        cli.repo_location.clone(),
        cli.ruleset.clone(),
        cli.output_dir.clone(),
    );
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    config.aux_classpath = cli.aux_jars.clone();
    config.analyzer.base_url = cli.analyzer_url.clone();
    config.analyzer.spawn_command = cli.analyzer_cmd.clone();
    config.cache.persist = !cli.no_cache_persist;
    config
}

/// First Ctrl-C requests a graceful drain; workers finish their current
/// commit, worktrees are reclaimed, and no summary is written.
fn spawn_interrupt_listener(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing in-flight commits");
            cancel.store(true, Ordering::SeqCst);
        }
    });
}
