//! `loadkit token` command implementation

use crate::error::Result;
use loadkit_core::{CoordinatorConfig, WorkerContext};

/// Fetch a token and print it on stdout
pub async fn run(
    config: CoordinatorConfig,
    client_id: &str,
    client_secret: &str,
    endpoint: &str,
) -> Result<()> {
    let ctx = WorkerContext::new(config)?;
    let token = ctx.token(client_id, client_secret, endpoint).await?;
    println!("{}", token);
    Ok(())
}
