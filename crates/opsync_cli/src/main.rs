//! opsync CLI
//!
//! Command-line tools for opsync preference directories.
//!
//! # Commands
//!
//! - `inspect` - Display stores, queue size and identity
//! - `dump-queue` - List pending operations for debugging
//! - `remove` - Drop one pending operation
//! - `clear` - Drop every pending operation

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// opsync command-line queue tools.
#[derive(Parser)]
#[command(name = "opsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the preference directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display stores, queue size and identity
    Inspect {
        /// Show every persisted store
        #[arg(short, long)]
        stores: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List pending operations in queue order
    DumpQueue {
        /// Maximum number of operations to list
        #[arg(short, long)]
        limit: Option<usize>,

        /// Skip this many operations
        #[arg(short, long, default_value = "0")]
        offset: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Drop one pending operation
    Remove {
        /// Operation id
        id: String,
    },

    /// Drop every pending operation
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { stores, format } => {
            let path = cli.path.ok_or("Preference path required for inspect")?;
            commands::inspect::run(&path, stores, &format)?;
        }
        Commands::DumpQueue {
            limit,
            offset,
            format,
        } => {
            let path = cli.path.ok_or("Preference path required for dump-queue")?;
            commands::dump_queue::run(&path, limit, offset, &format)?;
        }
        Commands::Remove { id } => {
            let path = cli.path.ok_or("Preference path required for remove")?;
            commands::edit::remove(&path, &id)?;
        }
        Commands::Clear { yes } => {
            let path = cli.path.ok_or("Preference path required for clear")?;
            commands::edit::clear(&path, yes)?;
        }
        Commands::Version => {
            println!("opsync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("opsync Core v{}", opsync_core::VERSION);
        }
    }

    Ok(())
}
