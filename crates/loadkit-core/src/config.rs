//! Configuration for a worker's coordination context
//!
//! Every worker process of a run must agree on the pointer directory and the
//! run id; both usually come from the environment the load generator exports
//! to its workers.

use loadkit_common::{LoadkitError, Result};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default timeout for token endpoint requests.
/// Can be overridden via LOADKIT_HTTP_TIMEOUT_SECS.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Delay between detecting exhaustion (or the failure cap) and cancelling the
/// run token. Can be overridden via LOADKIT_STOP_DELAY_MS.
pub const DEFAULT_STOP_DELAY_MS: u64 = 2_000;

/// Field delimiter of source data files.
pub const DEFAULT_DELIMITER: u8 = b',';

/// Worker coordination configuration
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Identifies one run; shared by every worker process of that run
    pub run_id: String,

    /// Directory holding one pointer file per source data file
    pub pointer_dir: PathBuf,

    /// Field delimiter used when loading source data files
    pub delimiter: u8,

    pub http_timeout: Duration,

    pub stop_delay: Duration,

    /// Cap on cumulative failed iterations; `None` disables it
    pub max_failures: Option<u64>,

    /// Append-only JSON-lines log of failed iterations
    pub failure_log: Option<PathBuf>,
}

impl CoordinatorConfig {
    /// Create a config with default values and a fresh run id
    pub fn new() -> Result<Self> {
        let pointer_dir = dirs::cache_dir()
            .ok_or_else(|| LoadkitError::config("Could not determine cache directory"))?
            .join("loadkit")
            .join("pointers");

        Ok(Self::with_pointer_dir(pointer_dir))
    }

    /// Defaults around an explicit pointer directory
    pub fn with_pointer_dir(pointer_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            pointer_dir: pointer_dir.into(),
            delimiter: DEFAULT_DELIMITER,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            stop_delay: Duration::from_millis(DEFAULT_STOP_DELAY_MS),
            max_failures: None,
            failure_log: None,
        }
    }

    /// Load config from environment variables
    ///
    /// - `LOADKIT_RUN_ID`
    /// - `LOADKIT_POINTER_DIR`
    /// - `LOADKIT_DELIMITER` (a single ASCII character, or `tab`)
    /// - `LOADKIT_HTTP_TIMEOUT_SECS`
    /// - `LOADKIT_STOP_DELAY_MS`
    /// - `LOADKIT_MAX_FAILURES`
    /// - `LOADKIT_FAILURE_LOG`
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var("LOADKIT_POINTER_DIR") {
            Ok(dir) => Self::with_pointer_dir(dir),
            Err(_) => Self::new()?,
        };

        if let Ok(run_id) = std::env::var("LOADKIT_RUN_ID") {
            config.set_run_id(run_id)?;
        }

        if let Ok(delimiter) = std::env::var("LOADKIT_DELIMITER") {
            config.delimiter = parse_delimiter(&delimiter)?;
        }

        if let Ok(secs) = std::env::var("LOADKIT_HTTP_TIMEOUT_SECS") {
            config.http_timeout = Duration::from_secs(parse_number(&secs, "LOADKIT_HTTP_TIMEOUT_SECS")?);
        }

        if let Ok(ms) = std::env::var("LOADKIT_STOP_DELAY_MS") {
            config.stop_delay = Duration::from_millis(parse_number(&ms, "LOADKIT_STOP_DELAY_MS")?);
        }

        if let Ok(max) = std::env::var("LOADKIT_MAX_FAILURES") {
            config.max_failures = Some(parse_number(&max, "LOADKIT_MAX_FAILURES")?);
        }

        if let Ok(path) = std::env::var("LOADKIT_FAILURE_LOG") {
            config.failure_log = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    /// Set the run id. Run ids end up in file names, so only a conservative
    /// character set is accepted.
    pub fn set_run_id(&mut self, run_id: impl Into<String>) -> Result<()> {
        let run_id = run_id.into();
        let valid = !run_id.is_empty()
            && run_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(LoadkitError::config(format!(
                "Invalid run id '{}': use letters, digits, '-', '_' or '.'",
                run_id
            )));
        }
        self.run_id = run_id;
        Ok(())
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        // If we can't determine the cache directory, fall back to a local directory
        Self::new().unwrap_or_else(|_| Self::with_pointer_dir(".loadkit/pointers"))
    }
}

/// Parse a delimiter setting: one ASCII character, or the word `tab`
pub fn parse_delimiter(raw: &str) -> Result<u8> {
    match raw {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        s if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        s => Err(LoadkitError::config(format!(
            "Invalid delimiter '{}': expected a single ASCII character or 'tab'",
            s
        ))),
    }
}

fn parse_number(raw: &str, name: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| LoadkitError::config(format!("{} must be a non-negative integer, got '{}'", name, raw)))
}
