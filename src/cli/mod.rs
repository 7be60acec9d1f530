//! Command-line surface.

pub mod list;
pub mod scan;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// arcadescan - health scanner for embedded browser games
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe every manifest entry and report health verdicts
    Scan(ScanArgs),

    /// List manifest entries and their persisted status
    List(ListArgs),
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Args)]
pub struct ScanArgs {
    /// Path to the games manifest (JSON)
    #[arg(long, default_value = "games.json")]
    pub manifest: PathBuf,

    /// Base URL of the serving endpoint
    #[arg(long, default_value = "http://localhost:8080/")]
    pub base_url: String,

    /// Readiness timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,

    /// Write fresh demotions back to the manifest
    #[arg(long)]
    pub fix: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Optional path to also write the structured report (JSON)
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Override Chrome/Chromium executable path (defaults to SCAN_CHROME or system path)
    #[arg(long)]
    pub chrome_path: Option<PathBuf>,

    /// Run Chrome with a visible window instead of headless mode
    #[arg(long)]
    pub headful: bool,

    /// Attach to an existing Chrome DevTools websocket instead of launching a new instance
    #[arg(long)]
    pub ws_url: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Path to the games manifest (JSON)
    #[arg(long, default_value = "games.json")]
    pub manifest: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}
