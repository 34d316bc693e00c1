//! CLI argument definitions using clap
//!
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tandem - Track shared expenses with your partner
#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Shared expense tracker with Gmail import and AI analysis", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tandem.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },

    /// Show database status
    Status,

    /// List expense categories
    Categories,

    /// Run the email extractor over a text file (for tuning patterns)
    Extract {
        /// File containing the email text, subject on the first line
        #[arg(short, long)]
        file: PathBuf,
    },
}
