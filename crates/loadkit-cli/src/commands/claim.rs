//! `loadkit claim` command implementation
//!
//! Claims rows the way a worker would and prints them as JSON.

use super::print_json;
use crate::error::{CliError, Result};
use loadkit_core::{ColumnMapping, CoordinatorConfig, WorkerContext};
use std::path::Path;
use tracing::info;

pub fn run(
    config: CoordinatorConfig,
    source: &Path,
    columns: &str,
    reset: bool,
    count: usize,
) -> Result<()> {
    if count == 0 {
        return Err(CliError::invalid_argument("--count must be at least 1"));
    }

    let mapping = ColumnMapping::parse(columns);
    let ctx = WorkerContext::new(config)?;

    let batch = ctx.distributor().claim_batch(source, &mapping, count, reset)?;
    info!(source = %source.display(), claimed = batch.rows.len(), exhausted = batch.exhausted, "Claim finished");

    if count == 1 {
        let claim = batch.rows.into_iter().next();
        match claim {
            Some(claim) => print_json(&claim),
            None => print_json(&serde_json::json!({ "values": {}, "index": null, "exhausted": true })),
        }
    } else {
        print_json(&batch)
    }
}
