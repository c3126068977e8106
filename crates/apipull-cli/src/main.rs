//! apipull CLI - Main entry point

use apipull_cli::config::Settings;
use apipull_cli::{Cli, Commands};
use apipull_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use clap::Parser;
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // A local .env is a convenience for development; absence is fine.
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging based on verbose flag and environment
    let log_config = if cli.verbose {
        // Verbose mode: log to console with debug level
        LogConfig::builder()
            .level(LogLevel::Debug)
            .output(LogOutput::Console)
            .log_file_prefix("apipull".to_string())
            .build()
    } else {
        LogConfig::builder()
            .level(LogLevel::Info)
            .output(LogOutput::Console)
            .log_file_prefix("apipull".to_string())
            .build()
    };

    // Merge with environment variables (they take precedence)
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    // Initialize logging (ignore errors as CLI should work without logging)
    let _ = init_logging(&log_config);

    // Execute command
    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> anyhow::Result<()> {
    let settings = Settings::from_env();

    match &cli.command {
        Commands::List { vendor } => apipull_cli::commands::list::run(*vendor, cli.verbose),
        Commands::Load(args) => apipull_cli::commands::load::run(args, &settings).await,
    }
}
