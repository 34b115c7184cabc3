//! Loadkit core
//!
//! Stateful test-data coordination for load-test workers:
//!
//! - **Credential cache**: one bearer token per client identity, renewed
//!   shortly before it expires ([`auth`])
//! - **Data pool distribution**: unique source rows per iteration through a
//!   durable pointer shared by all workers of a run ([`pool`])
//! - **Correlation**: values picked out of captured responses and chained
//!   into later requests ([`correlate`])
//! - **Run control**: graceful stop on pool exhaustion or too many failed
//!   iterations ([`run`])
//!
//! A host builds one [`WorkerContext`] per worker process and hands it to
//! every virtual user.

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod auth;
pub mod config;
pub mod context;
pub mod correlate;
pub mod failure_log;
pub mod pool;
pub mod run;

pub use auth::{CachedToken, CredentialCache, TokenClient, TokenPolicy};
pub use config::CoordinatorConfig;
pub use context::WorkerContext;
pub use correlate::{CorrelationEngine, CorrelationOutcome, CorrelationRule, SelectMode};
pub use failure_log::FailureLog;
pub use pool::{BatchClaim, Claim, ColumnMapping, DataPool, DataPoolDistributor, PointerStore};
pub use run::{RunControl, RunReport, StopReason};
