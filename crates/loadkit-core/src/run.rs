//! Run control: the graceful stop signal and the end-of-run report
//!
//! Two things end a run early: a data pool running dry, and the cumulative
//! number of failed iterations reaching the configured cap. Both go through
//! [`RunControl::request_stop`]. The first reason wins; the run token is
//! cancelled after the configured delay so in-flight iterations can finish.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// A data pool ran out of rows
    Exhausted { source: String },
    /// Failed iterations reached the cap
    FailureThreshold { failures: u64, limit: u64 },
    /// The host asked for it
    Manual,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Exhausted { source } => write!(f, "data pool '{}' exhausted", source),
            StopReason::FailureThreshold { failures, limit } => {
                write!(f, "{} failed iterations (limit {})", failures, limit)
            },
            StopReason::Manual => write!(f, "stopped by host"),
        }
    }
}

/// Summary of a run as seen by one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub stop_reason: Option<StopReason>,
    pub claims: u64,
    pub failed_iterations: u64,
    pub exhausted_sources: Vec<String>,
}

/// Shared stop signal of one worker
pub struct RunControl {
    run_id: String,
    stop_delay: Duration,
    max_failures: Option<u64>,
    token: CancellationToken,
    reason: Mutex<Option<StopReason>>,
    exhausted: Mutex<BTreeSet<String>>,
    failures: AtomicU64,
    claims: AtomicU64,
}

impl RunControl {
    pub fn new(run_id: impl Into<String>, stop_delay: Duration, max_failures: Option<u64>) -> Self {
        Self {
            run_id: run_id.into(),
            stop_delay,
            max_failures,
            token: CancellationToken::new(),
            reason: Mutex::new(None),
            exhausted: Mutex::new(BTreeSet::new()),
            failures: AtomicU64::new(0),
            claims: AtomicU64::new(0),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Ask the run to stop. Returns `false` if a stop was already requested.
    ///
    /// Never blocks. Inside a tokio runtime the token is cancelled by a
    /// detached task after the stop delay; without one it is cancelled
    /// immediately.
    pub fn request_stop(&self, reason: StopReason) -> bool {
        {
            let mut current = self.reason.lock();
            if current.is_some() {
                debug!(reason = %reason, "Stop already requested");
                return false;
            }
            *current = Some(reason.clone());
        }

        info!(run_id = %self.run_id, reason = %reason, delay_ms = self.stop_delay.as_millis() as u64, "Run stop requested");

        if self.stop_delay.is_zero() {
            self.token.cancel();
            return true;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let token = self.token.clone();
                let delay = self.stop_delay;
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    token.cancel();
                });
            },
            Err(_) => {
                debug!("No async runtime; cancelling run immediately");
                self.token.cancel();
            },
        }

        true
    }

    /// True as soon as a stop has been requested, before the delay elapses.
    /// Hosts stop scheduling new iterations at this point.
    pub fn is_stopping(&self) -> bool {
        self.reason.lock().is_some()
    }

    /// True once the run token has been cancelled
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves when the run token is cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Child token for host tasks
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.reason.lock().clone()
    }

    /// Count a failed iteration; reaching the cap requests a stop.
    /// Returns the cumulative failure count.
    pub fn record_failure(&self) -> u64 {
        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(limit) = self.max_failures {
            if failures >= limit {
                warn!(run_id = %self.run_id, failures = failures, limit = limit, "Failure threshold reached");
                self.request_stop(StopReason::FailureThreshold { failures, limit });
            }
        }

        failures
    }

    pub fn record_claims(&self, count: u64) {
        self.claims.fetch_add(count, Ordering::Relaxed);
    }

    pub fn mark_exhausted(&self, source: impl Into<String>) {
        self.exhausted.lock().insert(source.into());
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            run_id: self.run_id.clone(),
            stop_reason: self.stop_reason(),
            claims: self.claims.load(Ordering::Relaxed),
            failed_iterations: self.failures.load(Ordering::SeqCst),
            exhausted_sources: self.exhausted.lock().iter().cloned().collect(),
        }
    }
}
