use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arcadescan_cli::cli::{list::cmd_list, scan::cmd_scan, Cli, Commands};
use arcadescan_cli::{ScanError, EXIT_ABORTED};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(&cli.log_level, cli.debug) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::from(EXIT_ABORTED);
    }

    let result = match cli.command {
        Commands::Scan(args) => cmd_scan(args).await,
        Commands::List(args) => cmd_list(args).map(|()| 0),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            match &err {
                ScanError::InfraUnreachable { .. } => {
                    error!("scan aborted: {err}");
                }
                other => error!("command failed: {other}"),
            }
            ExitCode::from(EXIT_ABORTED)
        }
    }
}

fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}
