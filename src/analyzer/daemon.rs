//! Supervision of the analyzer daemon as a child process.
//!
//! The daemon's startup cost dominates per-commit latency if it is launched
//! per invocation, so the batch driver starts it once, before the pipeline,
//! and owns it until shutdown. When no spawn command is configured the
//! daemon is assumed to be externally managed and only the readiness gate
//! applies.

use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::core::errors::{MinerError, Result};

/// A spawned analyzer daemon process, killed on shutdown.
pub struct AnalyzerDaemon {
    child: Child,
    command: String,
}

impl AnalyzerDaemon {
    /// Spawn the daemon from a whitespace-separated command line.
    pub fn spawn(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next().ok_or_else(|| {
            MinerError::config_field("analyzer command is empty", "analyzer.spawn_command")
        })?;

        let child = Command::new(program)
            .args(parts)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MinerError::io(format!("Failed to spawn analyzer daemon '{program}'"), e)
            })?;

        info!("Spawned analyzer daemon: {command_line}");
        Ok(Self {
            child,
            command: command_line.to_string(),
        })
    }

    /// Signal the daemon to exit and reap it.
    pub async fn shutdown(mut self) {
        match self.child.kill().await {
            Ok(()) => info!("Analyzer daemon stopped: {}", self.command),
            Err(e) => warn!("Failed to stop analyzer daemon ({}): {e}", self.command),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_rejects_empty_command() {
        assert!(AnalyzerDaemon::spawn("   ").is_err());
    }

    #[tokio::test]
    async fn spawn_and_shutdown_short_lived_process() {
        let daemon = AnalyzerDaemon::spawn("sleep 30").unwrap();
        daemon.shutdown().await;
    }
}
