//! Loadkit CLI - Main entry point

use clap::Parser;
use loadkit_cli::{Cli, Commands, PointerCommand};
use loadkit_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Pick up LOADKIT_* settings from a local .env file
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Verbose mode logs debug to the console; otherwise only warnings
    let level = if cli.verbose { LogLevel::Debug } else { LogLevel::Warn };
    let log_config = LogConfig::builder()
        .level(level)
        .output(LogOutput::Console)
        .log_file_prefix("loadkit-cli")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI works without logging
    let _guard = init_logging(&log_config).ok();

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> loadkit_cli::Result<()> {
    match &cli.command {
        Commands::Claim {
            source,
            columns,
            reset,
            count,
        } => {
            let config = cli.coordinator_config()?;
            loadkit_cli::commands::claim::run(config, source, columns, *reset, *count)
        },

        Commands::Pointer { command } => {
            let config = cli.coordinator_config()?;
            match command {
                PointerCommand::Show { source } => loadkit_cli::commands::pointer::show(&config, source),
                PointerCommand::Reset { source } => loadkit_cli::commands::pointer::reset(&config, source),
            }
        },

        Commands::Token {
            client_id,
            client_secret,
            endpoint,
        } => {
            let config = cli.coordinator_config()?;
            loadkit_cli::commands::token::run(config, client_id, client_secret, endpoint).await
        },

        Commands::Correlate {
            input,
            rules,
            path,
            seed,
        } => loadkit_cli::commands::correlate::run(input, rules, path, *seed),

        Commands::Drain {
            source,
            columns,
            users,
            reset,
            max_failures,
        } => {
            let mut config = cli.coordinator_config()?;
            config.max_failures = Some(*max_failures);
            loadkit_cli::commands::drain::run(config, source, columns, *users, *reset).await
        },
    }
}
