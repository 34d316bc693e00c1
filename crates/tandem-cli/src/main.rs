//! Tandem CLI - Shared expense tracker
//!
//! Usage:
//!   tandem init                 Initialize database
//!   tandem serve --port 8000    Start the API server
//!   tandem status               Show database status
//!   tandem categories           List expense categories

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Serve { host, port } => commands::cmd_serve(&cli.db, &host, port).await,
        Commands::Status => commands::cmd_status(&cli.db),
        Commands::Categories => commands::cmd_categories(&cli.db),
        Commands::Extract { file } => commands::cmd_extract(&file),
    }
}
