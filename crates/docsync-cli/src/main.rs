//! Document Sync CLI - command-line interface for the sync engine
//!
//! Provides commands for:
//! - Running a sync or scan against a knowledge base
//! - Driving a multi-source knowledge base's sync
//! - Inspecting recent sync-run history and KB configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::info::InfoCommand;
use commands::multi_source::MultiSourceCommand;
use commands::scan::ScanCommand;
use commands::status::StatusCommand;
use commands::sync::SyncCommand;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "docsync", version, about = "Document sync engine for RAG knowledge bases")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Synchronize a knowledge base against its source
    Sync(SyncCommand),
    /// Scan a knowledge base (or ad hoc path) without advancing its delta token
    Scan(ScanCommand),
    /// Drive a multi-source knowledge base
    #[command(subcommand)]
    MultiSource(MultiSourceCommand),
    /// Show recent sync-run history for a knowledge base
    Status(StatusCommand),
    /// Show a knowledge base's stored configuration
    Info(InfoCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(format).await,
        Commands::Scan(cmd) => cmd.execute(format).await,
        Commands::MultiSource(cmd) => cmd.execute(format).await,
        Commands::Status(cmd) => cmd.execute(format).await,
        Commands::Info(cmd) => cmd.execute(format).await,
    }
}
