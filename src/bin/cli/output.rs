//! Progress rendering and result display.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use pmd_miner::BatchReport;

/// Progress bar on stderr, redrawn at most once per second.
pub fn batch_progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr_with_hz(1));
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.blue} [{elapsed_precise}] {bar:30.cyan/dim} {pos}/{len} commits {msg}",
        )
        .expect("static progress template")
        .progress_chars("=>-"),
    );
    bar.enable_steady_tick(Duration::from_secs(1));
    bar
}

/// Print the batch's closing lines.
pub fn print_batch_report(report: &BatchReport, summary_path: &std::path::Path, quiet: bool) {
    if quiet {
        return;
    }

    if report.interrupted {
        eprintln!(
            "{} {}/{} commits completed before interrupt; no summary written",
            style("Interrupted:").yellow().bold(),
            report.completed.len(),
            report.total_commits
        );
        return;
    }

    eprintln!(
        "{} {}/{} commits analyzed",
        style("Done:").green().bold(),
        report.completed.len(),
        report.total_commits
    );
    if !report.errors.is_empty() {
        eprintln!(
            "{} {} commits skipped or failed (recorded in summary)",
            style("Partial:").yellow().bold(),
            report.errors.len()
        );
    }
    eprintln!("Summary written to {}", summary_path.display());
}
