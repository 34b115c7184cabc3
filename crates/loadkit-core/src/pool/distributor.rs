//! Hands out unique source rows to the iterations of one worker

use super::pointer::{PointerFile, PointerStore, ResetOutcome};
use super::source::DataPool;
use crate::run::{RunControl, StopReason};
use loadkit_common::{LoadkitError, Result, VariableStore};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How the fields of a row become variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnMapping {
    /// The first field goes to this variable
    Single(String),
    /// Fields go to these variables by position
    Positional(Vec<String>),
}

impl ColumnMapping {
    /// `"user"` maps the first field, `"user,password"` maps positionally
    pub fn parse(names: &str) -> Self {
        let names: Vec<String> = names
            .split(',')
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        match names.as_slice() {
            [single] => ColumnMapping::Single(single.clone()),
            _ => ColumnMapping::Positional(names),
        }
    }

    /// Names beyond the row's field count are left out
    pub fn map_row(&self, row: &[String]) -> BTreeMap<String, String> {
        match self {
            ColumnMapping::Single(name) => row
                .first()
                .map(|field| BTreeMap::from([(name.clone(), field.clone())]))
                .unwrap_or_default(),
            ColumnMapping::Positional(names) => names
                .iter()
                .zip(row.iter())
                .map(|(name, field)| (name.clone(), field.clone()))
                .collect(),
        }
    }
}

/// Result of a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claim {
    pub values: BTreeMap<String, String>,
    /// Row offset that was claimed
    pub index: Option<usize>,
    pub exhausted: bool,
}

impl Claim {
    fn exhausted() -> Self {
        Self {
            values: BTreeMap::new(),
            index: None,
            exhausted: true,
        }
    }

    /// Copy the claimed values into an iteration's variables
    pub fn apply_to(&self, vars: &mut VariableStore) {
        for (name, value) in &self.values {
            vars.set(name.clone(), value.clone());
        }
    }
}

/// Result of a batch claim; `exhausted` is set only when no row was left
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchClaim {
    pub rows: Vec<Claim>,
    pub exhausted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceState {
    Active,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResetState {
    Pending,
    Done,
}

struct SourceEntry {
    pool: Arc<DataPool>,
    pointer: PointerFile,
    state: SourceState,
    reset: ResetState,
}

/// Per-worker distributor over any number of source files.
///
/// Claims on one source are serialized inside the worker: the source's lock
/// is held from reading the pointer until the advanced pointer is written.
/// Other worker processes sharing the pointer directory are not part of that
/// lock; see the pointer module.
pub struct DataPoolDistributor {
    pointers: PointerStore,
    delimiter: u8,
    run: Arc<RunControl>,
    sources: Mutex<HashMap<PathBuf, Arc<Mutex<SourceEntry>>>>,
}

impl DataPoolDistributor {
    pub fn new(pointers: PointerStore, delimiter: u8, run: Arc<RunControl>) -> Self {
        Self {
            pointers,
            delimiter,
            run,
            sources: Mutex::new(HashMap::new()),
        }
    }

    pub fn pointers(&self) -> &PointerStore {
        &self.pointers
    }

    /// Claim the next row of `source`.
    ///
    /// With `reset_requested`, the first caller of the run rewinds the
    /// pointer to 0 before reading it; later requests are ignored. A failed
    /// reset is retried by the next request.
    ///
    /// This is blocking file I/O. A caller that lost the reset race to a
    /// caller still mid-reset waits up to a second, holding the source's
    /// lock; async callers should use `spawn_blocking`.
    pub fn claim_next(
        &self,
        source: &Path,
        mapping: &ColumnMapping,
        reset_requested: bool,
    ) -> Result<Claim> {
        let mut batch = self.claim(source, mapping, 1, reset_requested)?;
        Ok(batch.rows.pop().unwrap_or_else(Claim::exhausted))
    }

    /// Claim up to `count` consecutive rows with a single pointer advance
    pub fn claim_batch(
        &self,
        source: &Path,
        mapping: &ColumnMapping,
        count: usize,
        reset_requested: bool,
    ) -> Result<BatchClaim> {
        self.claim(source, mapping, count, reset_requested)
    }

    /// Pool of a source, loading it on first use
    pub fn pool(&self, source: &Path) -> Result<Arc<DataPool>> {
        let entry = self.entry(source)?;
        let pool = Arc::clone(&entry.lock().pool);
        Ok(pool)
    }

    /// True once this worker has seen the source run dry
    pub fn is_exhausted(&self, source: &Path) -> bool {
        let Ok(key) = source_key(source) else {
            return false;
        };
        let entry = self.sources.lock().get(&key).cloned();
        entry.is_some_and(|entry| entry.lock().state == SourceState::Exhausted)
    }

    fn claim(
        &self,
        source: &Path,
        mapping: &ColumnMapping,
        count: usize,
        reset_requested: bool,
    ) -> Result<BatchClaim> {
        let entry = self.entry(source)?;
        let mut entry = entry.lock();

        if entry.state == SourceState::Exhausted {
            return Ok(BatchClaim {
                rows: Vec::new(),
                exhausted: true,
            });
        }

        if count == 0 {
            return Ok(BatchClaim {
                rows: Vec::new(),
                exhausted: false,
            });
        }

        if reset_requested && entry.reset == ResetState::Pending {
            let outcome = entry.pointer.reset_once(self.run.run_id())?;
            entry.reset = ResetState::Done;
            match outcome {
                ResetOutcome::Performed => {
                    info!(source = %source.display(), run_id = %self.run.run_id(), "Reset data pool pointer");
                },
                ResetOutcome::Recovered => {
                    warn!(source = %source.display(), run_id = %self.run.run_id(), "Reset data pool pointer after an abandoned reset");
                },
                ResetOutcome::AlreadyDone => {},
            }
        }

        let start = entry.pointer.read_or_init()?;
        let len = entry.pool.len();

        if start >= len {
            entry.state = SourceState::Exhausted;
            warn!(source = %source.display(), rows = len, pointer = start, "Data pool exhausted");
            self.run.mark_exhausted(source.display().to_string());
            self.run.request_stop(StopReason::Exhausted {
                source: source.display().to_string(),
            });
            return Ok(BatchClaim {
                rows: Vec::new(),
                exhausted: true,
            });
        }

        let end = start.saturating_add(count).min(len);
        let rows: Vec<Claim> = (start..end)
            .map(|index| Claim {
                values: entry
                    .pool
                    .row(index)
                    .map(|row| mapping.map_row(row))
                    .unwrap_or_default(),
                index: Some(index),
                exhausted: false,
            })
            .collect();

        // Nothing is handed out unless the advance is durable
        entry.pointer.write(end)?;
        self.run.record_claims(rows.len() as u64);
        debug!(source = %source.display(), from = start, to = end, "Claimed rows");

        Ok(BatchClaim {
            rows,
            exhausted: false,
        })
    }

    fn entry(&self, source: &Path) -> Result<Arc<Mutex<SourceEntry>>> {
        let key = source_key(source)?;
        let mut sources = self.sources.lock();

        if let Some(entry) = sources.get(&key) {
            return Ok(Arc::clone(entry));
        }

        let pool = DataPool::load(&key, self.delimiter)?;
        let pointer = self.pointers.open(&key)?;
        let entry = Arc::new(Mutex::new(SourceEntry {
            pool: Arc::new(pool),
            pointer,
            state: SourceState::Active,
            reset: ResetState::Pending,
        }));
        sources.insert(key, Arc::clone(&entry));
        Ok(entry)
    }

    #[cfg(test)]
    pub(crate) fn replace_pointer(&self, source: &Path, pointer: PointerFile) {
        if let Ok(entry) = self.entry(source) {
            entry.lock().pointer = pointer;
        }
    }
}

/// File identity of a source: its canonical path
fn source_key(source: &Path) -> Result<PathBuf> {
    source
        .canonicalize()
        .map_err(|e| LoadkitError::pool_load(source.display().to_string(), e.to_string()))
}
