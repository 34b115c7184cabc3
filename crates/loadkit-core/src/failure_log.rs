//! Append-only log of failed iterations
//!
//! One JSON object per line. Several worker processes may append to the same
//! file; each record is written with a single `write` call on a file opened
//! in append mode.

use chrono::{DateTime, Utc};
use loadkit_common::{LoadkitError, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct FailureRecord<'a> {
    timestamp: DateTime<Utc>,
    run_id: &'a str,
    worker: &'a str,
    kind: &'a str,
    message: String,
}

/// Failure log writer
pub struct FailureLog {
    path: PathBuf,
    run_id: String,
    worker: String,
    lock: Mutex<()>,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>, run_id: impl Into<String>, worker: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            run_id: run_id.into(),
            worker: worker.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record for `error`
    pub fn append(&self, error: &LoadkitError) -> Result<()> {
        let record = FailureRecord {
            timestamp: Utc::now(),
            run_id: &self.run_id,
            worker: &self.worker,
            kind: error.kind(),
            message: error.to_string(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
