//! Error types for loadkit
//!
//! Fatal errors abort the current iteration and are handed back to the host.
//! Correlation problems are never fatal; they surface as [`CorrelationWarning`]
//! values next to whatever variables could still be populated.

use thiserror::Error;

/// Result type alias for loadkit operations
pub type Result<T> = std::result::Result<T, LoadkitError>;

/// Main error type for loadkit
#[derive(Error, Debug)]
pub enum LoadkitError {
    /// Credential exchange against the token endpoint failed
    #[error("Authentication failed for client '{client}': {reason}")]
    Auth { client: String, reason: String },

    /// Source data file is missing or unreadable
    #[error("Failed to load data pool '{path}': {reason}")]
    PoolLoad { path: String, reason: String },

    /// Pointer file could not be read, parsed or written
    #[error("Pointer store error for '{path}': {reason}")]
    PoolState { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LoadkitError {
    /// Create an authentication error
    pub fn auth(client: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Auth {
            client: client.into(),
            reason: reason.into(),
        }
    }

    /// Create a pool load error
    pub fn pool_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PoolLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a pointer store error
    pub fn pool_state(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PoolState {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Short machine-readable kind, used in failure logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::PoolLoad { .. } => "pool_load",
            Self::PoolState { .. } => "pool_state",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Non-fatal correlation problem. The affected variable is left absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationWarning {
    /// The array path resolved to nothing or to a non-array value
    MissingArray { path: String },

    /// The array path resolved to an empty array
    EmptyArray { path: String },

    /// The selected element has no such field
    MissingField {
        target: String,
        field: String,
        index: usize,
    },

    /// A literal index pointed past the end of the array
    IndexOutOfBounds {
        target: String,
        index: i64,
        len: usize,
    },
}

impl std::fmt::Display for CorrelationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingArray { path } => {
                write!(f, "no array found at path '{}'", path)
            },
            Self::EmptyArray { path } => write!(f, "array at path '{}' is empty", path),
            Self::MissingField {
                target,
                field,
                index,
            } => write!(
                f,
                "field '{}' missing on element {} (target '{}')",
                field, index, target
            ),
            Self::IndexOutOfBounds { target, index, len } => write!(
                f,
                "index {} out of bounds for array of length {} (target '{}')",
                index, len, target
            ),
        }
    }
}
