//! Error types for the loadkit CLI
//!
//! Messages are user-facing and say what to check next.

use loadkit_common::LoadkitError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// Error from the coordination core
    #[error(transparent)]
    Core(#[from] LoadkitError),

    /// Required file is missing
    #[error("File not found: '{0}'. Verify the file path exists and you have read permissions.")]
    FileNotFound(String),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}. Check the file syntax.")]
    JsonParse(#[from] serde_json::Error),

    /// Argument combination that cannot work
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The run was stopped because too many iterations failed
    #[error("Run aborted: {0}. See the failure log or rerun with --verbose.")]
    RunAborted(String),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a run aborted error
    pub fn run_aborted(msg: impl Into<String>) -> Self {
        Self::RunAborted(msg.into())
    }
}
