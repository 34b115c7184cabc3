//! `loadkit drain` command implementation
//!
//! Spawns virtual users that claim rows from one source until the run stops,
//! then prints the run report. Useful for checking a pool and its pointer
//! before a real load test, and for watching several `drain` processes share
//! a pointer directory.

use super::print_json;
use crate::error::{CliError, Result};
use loadkit_core::{ColumnMapping, CoordinatorConfig, StopReason, WorkerContext};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

pub async fn run(
    config: CoordinatorConfig,
    source: &Path,
    columns: &str,
    users: usize,
    reset: bool,
) -> Result<()> {
    if users == 0 {
        return Err(CliError::invalid_argument("--users must be at least 1"));
    }

    let ctx = Arc::new(WorkerContext::new(config)?);
    let mapping = Arc::new(ColumnMapping::parse(columns));
    info!(run_id = %ctx.run().run_id(), source = %source.display(), users = users, "Starting drain");

    let handles: Vec<_> = (0..users)
        .map(|user| {
            let ctx = Arc::clone(&ctx);
            let mapping = Arc::clone(&mapping);
            let source = source.to_path_buf();
            tokio::spawn(virtual_user(user, ctx, source, mapping, reset))
        })
        .collect();

    for handle in handles {
        handle
            .await
            .map_err(|e| anyhow::anyhow!("virtual user panicked: {}", e))?;
    }

    let report = ctx.report();
    print_json(&report)?;

    match report.stop_reason {
        Some(reason @ StopReason::FailureThreshold { .. }) => Err(CliError::run_aborted(reason.to_string())),
        _ => Ok(()),
    }
}

async fn virtual_user(
    user: usize,
    ctx: Arc<WorkerContext>,
    source: PathBuf,
    mapping: Arc<ColumnMapping>,
    reset: bool,
) {
    let mut iterations = 0u64;
    while !ctx.run().is_stopping() {
        // Claims do blocking file I/O and may wait on another worker's reset
        let claim = {
            let ctx = Arc::clone(&ctx);
            let source = source.clone();
            let mapping = Arc::clone(&mapping);
            tokio::task::spawn_blocking(move || ctx.begin_iteration(&source, &mapping, reset)).await
        };
        let claim = match claim {
            Ok(claim) => claim,
            Err(e) => {
                error!(user = user, error = %e, "Claim task failed");
                break;
            },
        };

        match claim {
            Ok(Some(vars)) => {
                iterations += 1;
                debug!(user = user, vars = %vars.to_json(), "Iteration");
            },
            Ok(None) => break,
            Err(e) => {
                ctx.record_failure(&e);
            },
        }
    }
    debug!(user = user, iterations = iterations, "Virtual user finished");
}
