//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod claim;
pub mod correlate;
pub mod drain;
pub mod pointer;
pub mod token;

use crate::error::{CliError, Result};
use serde::Serialize;
use std::path::Path;

/// Print a value as pretty JSON on stdout
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Read and parse a JSON file
pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(CliError::FileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
