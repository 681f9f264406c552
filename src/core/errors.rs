//! Error types for the pmd-miner library.
//!
//! Structured error types that preserve context and map onto the process
//! exit codes the CLI reports. Per-commit failures (checkout, analyzer)
//! are recovered locally by the pipeline; setup failures surface here.

use std::io;

use thiserror::Error;

/// Main result type for pmd-miner operations.
pub type Result<T> = std::result::Result<T, MinerError>;

/// Comprehensive error type for all pmd-miner operations.
#[derive(Error, Debug)]
pub enum MinerError {
    /// I/O errors from file operations.
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Invalid configuration or CLI arguments.
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Base repository clone, open, or commit enumeration failed.
    #[error("Repository error: {message}")]
    Repository {
        /// Error description
        message: String,
        /// Underlying git error, when one exists
        #[source]
        source: Option<git2::Error>,
    },

    /// A worktree could not be moved to the requested commit.
    #[error("Checkout of {commit} failed: {message}")]
    Checkout {
        /// Commit hash that was being checked out
        commit: String,
        /// Error description
        message: String,
    },

    /// The analyzer endpoint never became reachable.
    #[error("Analyzer unreachable at {endpoint} after {waited_ms} ms")]
    AnalyzerUnreachable {
        /// Endpoint that was probed
        endpoint: String,
        /// Total time spent probing
        waited_ms: u64,
    },

    /// The analyzer answered outside its wire contract.
    #[error("Analyzer protocol error: {message}")]
    AnalyzerProtocol {
        /// Error description
        message: String,
        /// HTTP status code, when the response carried one
        status: Option<u16>,
    },

    /// The analyzer reported an internal failure (HTTP 500).
    #[error("Analyzer internal error: {message}")]
    AnalyzerInternal {
        /// Error excerpt from the analyzer's response body
        message: String,
    },

    /// Finding cache errors.
    #[error("Cache error: {message}")]
    Cache {
        /// Error description
        message: String,
    },

    /// Serialization/deserialization errors.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Mining pipeline orchestration errors.
    #[error("Pipeline error at stage '{stage}': {message}")]
    Pipeline {
        /// Pipeline stage where the error occurred
        stage: String,
        /// Error description
        message: String,
    },
}

impl MinerError {
    /// Create a new I/O error with context.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context.
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new repository error.
    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new repository error wrapping a git error.
    pub fn repository_from(message: impl Into<String>, source: git2::Error) -> Self {
        Self::Repository {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a new checkout error.
    pub fn checkout(commit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Checkout {
            commit: commit.into(),
            message: message.into(),
        }
    }

    /// Create a new analyzer protocol error.
    pub fn analyzer_protocol(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::AnalyzerProtocol {
            message: message.into(),
            status,
        }
    }

    /// Create a new analyzer internal error.
    pub fn analyzer_internal(message: impl Into<String>) -> Self {
        Self::AnalyzerInternal {
            message: message.into(),
        }
    }

    /// Create a new cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a new serialization error wrapping its source.
    pub fn serialization(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new pipeline error.
    pub fn pipeline(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pipeline {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Process exit code for setup-phase errors.
    ///
    /// Per-commit errors never reach this mapping; the pipeline recovers
    /// them locally and the batch exit code is derived from the report.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Repository { .. } => 3,
            Self::AnalyzerUnreachable { .. } => 4,
            _ => 1,
        }
    }
}

/// Extension trait for adding miner context to foreign results.
pub trait MinerResultExt<T> {
    /// Map an I/O error into a [`MinerError::Io`] with context.
    fn map_io_err(self, context: &str) -> Result<T>;
}

impl<T> MinerResultExt<T> for std::result::Result<T, io::Error> {
    fn map_io_err(self, context: &str) -> Result<T> {
        self.map_err(|e| MinerError::io(context, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_cli_contract() {
        assert_eq!(MinerError::config("bad").exit_code(), 2);
        assert_eq!(MinerError::repository("gone").exit_code(), 3);
        assert_eq!(
            MinerError::AnalyzerUnreachable {
                endpoint: "http://127.0.0.1:8000".into(),
                waited_ms: 30_000,
            }
            .exit_code(),
            4
        );
        assert_eq!(MinerError::cache("corrupt").exit_code(), 1);
    }

    #[test]
    fn io_errors_preserve_source() {
        let err = std::fs::read("/nonexistent/definitely/missing").map_io_err("reading input");
        let err = err.unwrap_err();
        assert!(err.to_string().contains("reading input"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
