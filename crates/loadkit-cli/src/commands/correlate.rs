//! `loadkit correlate` command implementation
//!
//! Runs correlation rules against a captured response file, which is handy
//! for checking rules before a test uses them.

use super::{print_json, read_json};
use crate::error::Result;
use loadkit_common::VariableStore;
use loadkit_core::{CorrelationEngine, CorrelationRule};
use serde_json::{json, Value as Json};
use std::path::Path;

pub fn run(input: &Path, rules: &Path, array_path: &str, seed: Option<u64>) -> Result<()> {
    let captured: Json = read_json(input)?;
    let rules: Vec<CorrelationRule> = read_json(rules)?;

    let engine = match seed {
        Some(seed) => CorrelationEngine::with_seed(seed),
        None => CorrelationEngine::new(),
    };

    let mut vars = VariableStore::new();
    let outcome = engine.correlate(&captured, array_path, &rules, &mut vars);

    let warnings: Vec<String> = outcome.warnings.iter().map(ToString::to_string).collect();
    print_json(&json!({
        "variables": vars.to_json(),
        "warnings": warnings,
    }))
}
