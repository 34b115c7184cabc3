//! Durable row pointers
//!
//! One small text file per source data file holds the offset of the next
//! unclaimed row as a decimal number. Files are only ever replaced whole
//! (write to a temp file, then rename), which is safe without locks on the
//! shared filesystems workers typically use.
//!
//! Reads and writes are NOT a transaction. Two processes sharing a pointer
//! directory can read the same value and both hand out that row.

use loadkit_common::{LoadkitError, Result};
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const POINTER_EXTENSION: &str = "ptr";
const RESET_DONE: &str = "done";

/// How long a worker that lost the reset race waits for the winner to finish
const RESET_SETTLE_TIMEOUT: Duration = Duration::from_secs(1);
const RESET_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Reset markers of other runs older than this are removed by the next reset
const MARKER_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Directory holding pointer files
#[derive(Debug, Clone)]
pub struct PointerStore {
    dir: PathBuf,
}

impl PointerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Pointer file for a source. The name keeps the source's file stem for
    /// humans and adds a hash of the canonical path so same-named files in
    /// different directories never share a pointer.
    ///
    /// The source must exist: a path that cannot be canonicalized would hash
    /// to a different pointer than the one workers use.
    pub fn location(&self, source: &Path) -> Result<PathBuf> {
        let identity = source
            .canonicalize()
            .map_err(|e| LoadkitError::pool_load(source.display().to_string(), e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(identity.to_string_lossy().as_bytes());
        let digest = hex::encode(hasher.finalize());

        let stem: String = identity
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "source".to_string())
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();

        Ok(self
            .dir
            .join(format!("{}-{}.{}", stem, &digest[..16], POINTER_EXTENSION)))
    }

    /// Open the pointer for a source, creating the directory if needed
    pub fn open(&self, source: &Path) -> Result<PointerFile> {
        let path = self.location(source)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            LoadkitError::pool_state(self.dir.display().to_string(), e.to_string())
        })?;
        Ok(PointerFile {
            path,
            staging: self.dir.clone(),
        })
    }
}

/// Outcome of trying to perform the once-per-run reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// This caller reset the pointer to 0
    Performed,
    /// The caller that claimed the reset never finished it; this caller did
    Recovered,
    /// Another caller of the same run already did
    AlreadyDone,
}

/// A single pointer file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerFile {
    path: PathBuf,
    /// Directory replacement files are written to before the rename
    staging: PathBuf,
}

impl PointerFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current value, or `None` if the file does not exist yet
    pub fn read(&self) -> Result<Option<usize>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.state_error(e.to_string())),
        };

        content
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| self.state_error(format!("invalid pointer value '{}': {}", content.trim(), e)))
    }

    /// Current value, initializing a missing file to 0
    pub fn read_or_init(&self) -> Result<usize> {
        match self.read()? {
            Some(value) => Ok(value),
            None => {
                self.write(0)?;
                debug!(pointer = %self.path.display(), "Initialized pointer");
                Ok(0)
            },
        }
    }

    /// Replace the stored value
    pub fn write(&self, value: usize) -> Result<()> {
        let mut tmp =
            NamedTempFile::new_in(&self.staging).map_err(|e| self.state_error(e.to_string()))?;
        tmp.write_all(value.to_string().as_bytes())
            .and_then(|_| tmp.flush())
            .map_err(|e| self.state_error(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| self.state_error(e.error.to_string()))?;

        Ok(())
    }

    /// Reset to 0 unless another caller of `run_id` already did.
    ///
    /// The winner is whoever atomically creates the run's reset marker. It
    /// writes 0 and then marks the reset done; if either step fails the
    /// marker is removed again so a retry can win. Losers wait briefly for
    /// the done mark. A marker that never completes belongs to a caller that
    /// died mid-reset, and the waiting caller performs the reset itself.
    ///
    /// Blocks the calling thread for up to one second while waiting.
    pub fn reset_once(&self, run_id: &str) -> Result<ResetOutcome> {
        let marker = self.reset_marker(run_id);

        match OpenOptions::new().write(true).create_new(true).open(&marker) {
            Ok(mut file) => {
                let done = self
                    .write(0)
                    .and_then(|_| {
                        file.write_all(RESET_DONE.as_bytes())
                            .map_err(|e| self.state_error(e.to_string()))
                    });
                if let Err(e) = done {
                    drop(file);
                    if let Err(remove) = std::fs::remove_file(&marker) {
                        warn!(marker = %marker.display(), error = %remove, "Failed to remove reset marker");
                    }
                    return Err(e);
                }

                debug!(pointer = %self.path.display(), run_id = %run_id, "Pointer reset");
                self.prune_markers(run_id);
                Ok(ResetOutcome::Performed)
            },
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if self.wait_for_reset(&marker) {
                    return Ok(ResetOutcome::AlreadyDone);
                }

                warn!(marker = %marker.display(), run_id = %run_id, "Reset marker never completed; resetting pointer");
                self.write(0)?;
                std::fs::write(&marker, RESET_DONE)
                    .map_err(|e| self.state_error(format!("cannot complete reset marker: {}", e)))?;
                Ok(ResetOutcome::Recovered)
            },
            Err(e) => Err(self.state_error(format!("cannot create reset marker: {}", e))),
        }
    }

    /// Marker file recording that `run_id` has reset this pointer
    pub fn reset_marker(&self, run_id: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".reset-{}", run_id));
        PathBuf::from(name)
    }

    /// True once the marker reads done, false on timeout
    fn wait_for_reset(&self, marker: &Path) -> bool {
        let deadline = Instant::now() + RESET_SETTLE_TIMEOUT;
        loop {
            let done = std::fs::read_to_string(marker)
                .map(|content| content == RESET_DONE)
                .unwrap_or(false);
            if done {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(RESET_POLL_INTERVAL);
        }
    }

    /// Remove this pointer's reset markers left by runs that ended long ago.
    /// Best effort; failures are only logged.
    fn prune_markers(&self, current_run: &str) {
        let (Some(dir), Some(name)) = (self.path.parent(), self.path.file_name()) else {
            return;
        };
        let prefix = format!("{}.reset-", name.to_string_lossy());
        let current = format!("{}{}", prefix, current_run);

        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !file_name.starts_with(&prefix) || file_name == current {
                continue;
            }

            let expired = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| SystemTime::now().duration_since(modified).ok())
                .is_some_and(|age| age > MARKER_RETENTION);
            if !expired {
                continue;
            }

            match std::fs::remove_file(entry.path()) {
                Ok(()) => debug!(marker = %file_name, "Pruned old reset marker"),
                Err(e) => debug!(marker = %file_name, error = %e, "Failed to prune reset marker"),
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn with_staging(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging = dir.into();
        self
    }

    fn state_error(&self, reason: impl Into<String>) -> LoadkitError {
        LoadkitError::pool_state(self.path.display().to_string(), reason)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn source(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, "a\nb\n").unwrap();
        path
    }

    fn pointer(dir: &TempDir) -> PointerFile {
        let source = source(dir, "users.csv");
        PointerStore::new(dir.path().join("pointers")).open(&source).unwrap()
    }

    #[test]
    fn test_missing_pointer_initializes_to_zero() {
        let dir = tempdir().unwrap();
        let pointer = pointer(&dir);

        assert_eq!(pointer.read().unwrap(), None);
        assert_eq!(pointer.read_or_init().unwrap(), 0);
        assert_eq!(std::fs::read_to_string(pointer.path()).unwrap(), "0");
    }

    #[test]
    fn test_write_replaces_whole_value() {
        let dir = tempdir().unwrap();
        let pointer = pointer(&dir);

        pointer.write(1234).unwrap();
        pointer.write(7).unwrap();
        assert_eq!(pointer.read().unwrap(), Some(7));
        assert_eq!(std::fs::read_to_string(pointer.path()).unwrap(), "7");
    }

    #[test]
    fn test_garbage_pointer_is_state_error() {
        let dir = tempdir().unwrap();
        let pointer = pointer(&dir);
        std::fs::write(pointer.path(), "twelve").unwrap();

        let err = pointer.read().unwrap_err();
        assert_eq!(err.kind(), "pool_state");
        assert!(pointer.read_or_init().is_err());
    }

    #[test]
    fn test_surrounding_whitespace_is_tolerated() {
        let dir = tempdir().unwrap();
        let pointer = pointer(&dir);
        std::fs::write(pointer.path(), "42\n").unwrap();
        assert_eq!(pointer.read().unwrap(), Some(42));
    }

    #[test]
    fn test_location_distinguishes_directories() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        let store = PointerStore::new("/ptr");

        let a = store.location(&source(&dir, "a/users.csv")).unwrap();
        let b = store.location(&source(&dir, "b/users.csv")).unwrap();

        assert_ne!(a, b);
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("users-"));
        assert!(name.ends_with(".ptr"));
        assert_eq!(a, store.location(&dir.path().join("a/../a/users.csv")).unwrap());
    }

    #[test]
    fn test_missing_source_has_no_location() {
        let dir = tempdir().unwrap();
        let store = PointerStore::new(dir.path().join("pointers"));

        let err = store.location(&dir.path().join("moved.csv")).unwrap_err();
        assert_eq!(err.kind(), "pool_load");
        assert!(store.open(&dir.path().join("moved.csv")).is_err());
    }

    #[test]
    fn test_reset_once_per_run() {
        let dir = tempdir().unwrap();
        let pointer = pointer(&dir);
        pointer.write(9).unwrap();

        assert_eq!(pointer.reset_once("run-1").unwrap(), ResetOutcome::Performed);
        assert_eq!(pointer.read().unwrap(), Some(0));

        pointer.write(3).unwrap();
        assert_eq!(pointer.reset_once("run-1").unwrap(), ResetOutcome::AlreadyDone);
        assert_eq!(pointer.read().unwrap(), Some(3));

        assert_eq!(pointer.reset_once("run-2").unwrap(), ResetOutcome::Performed);
        assert_eq!(pointer.read().unwrap(), Some(0));
    }

    #[test]
    fn test_failed_reset_releases_marker() {
        let dir = tempdir().unwrap();
        let pointer = pointer(&dir);
        pointer.write(2).unwrap();

        let broken = pointer.clone().with_staging(dir.path().join("missing"));
        assert_eq!(broken.reset_once("run-f").unwrap_err().kind(), "pool_state");
        assert!(!pointer.reset_marker("run-f").exists());
        assert_eq!(pointer.read().unwrap(), Some(2));

        assert_eq!(pointer.reset_once("run-f").unwrap(), ResetOutcome::Performed);
        assert_eq!(pointer.read().unwrap(), Some(0));
    }

    #[test]
    fn test_abandoned_marker_is_recovered() {
        let dir = tempdir().unwrap();
        let pointer = pointer(&dir);
        pointer.write(2).unwrap();
        std::fs::write(pointer.reset_marker("run-y"), "").unwrap();

        assert_eq!(pointer.reset_once("run-y").unwrap(), ResetOutcome::Recovered);
        assert_eq!(pointer.read().unwrap(), Some(0));
        assert_eq!(
            std::fs::read_to_string(pointer.reset_marker("run-y")).unwrap(),
            RESET_DONE
        );

        pointer.write(1).unwrap();
        assert_eq!(pointer.reset_once("run-y").unwrap(), ResetOutcome::AlreadyDone);
        assert_eq!(pointer.read().unwrap(), Some(1));
    }

    #[test]
    fn test_reset_prunes_expired_markers() {
        let dir = tempdir().unwrap();
        let pointer = pointer(&dir);

        let expired = pointer.reset_marker("run-old");
        std::fs::write(&expired, RESET_DONE).unwrap();
        std::fs::File::options()
            .write(true)
            .open(&expired)
            .unwrap()
            .set_modified(SystemTime::now() - MARKER_RETENTION - Duration::from_secs(60))
            .unwrap();
        let recent = pointer.reset_marker("run-recent");
        std::fs::write(&recent, RESET_DONE).unwrap();

        assert_eq!(pointer.reset_once("run-new").unwrap(), ResetOutcome::Performed);

        assert!(!expired.exists());
        assert!(recent.exists());
        assert!(pointer.reset_marker("run-new").exists());
    }
}
