//! `loadkit pointer` command implementation

use crate::error::Result;
use colored::Colorize;
use loadkit_core::{CoordinatorConfig, DataPool, PointerStore};
use std::path::Path;
use tracing::info;

/// Show where a source's pointer lives and how far the pool is drained
pub fn show(config: &CoordinatorConfig, source: &Path) -> Result<()> {
    let pointer = PointerStore::new(&config.pointer_dir).open(source)?;
    let value = pointer.read()?;

    println!("{}", source.display().to_string().green());
    println!("  Pointer file: {}", pointer.path().display());
    match value {
        Some(value) => println!("  Next row:     {}", value),
        None => println!("  Next row:     0 {}", "(no pointer yet)".dimmed()),
    }

    let pool = DataPool::load(source, config.delimiter)?;
    let next = value.unwrap_or(0);
    println!("  Rows:         {}", pool.len());
    println!("  Remaining:    {}", pool.len().saturating_sub(next));
    if next >= pool.len() {
        println!("  {}", "Exhausted".yellow().bold());
    }

    Ok(())
}

/// Rewind a source's pointer to the first row, unconditionally. The source
/// must exist so the pointer is the one workers resolve.
pub fn reset(config: &CoordinatorConfig, source: &Path) -> Result<()> {
    let pointer = PointerStore::new(&config.pointer_dir).open(source)?;
    let previous = pointer.read()?;
    pointer.write(0)?;

    info!(source = %source.display(), previous = ?previous, "Pointer reset from the command line");
    println!(
        "Reset pointer for {} ({} -> 0)",
        source.display(),
        previous.map(|v| v.to_string()).unwrap_or_else(|| "unset".to_string())
    );
    Ok(())
}
