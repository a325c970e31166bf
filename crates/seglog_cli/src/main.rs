//! seglog CLI
//!
//! Command-line tools for seglog commit logs.
//!
//! # Commands
//!
//! - `produce` - Append records from arguments or stdin
//! - `consume` - Print records from an offset, optionally tailing
//! - `dump` - Decode every frame of every segment
//! - `truncate` - Drop segments below an offset
//! - `inspect` - Display segment layout and offsets
//! - `verify` - Read back every record and report damage

mod commands;

use clap::{Parser, Subcommand};
use seglog_core::{Config, DEFAULT_MAX_INDEX_BYTES, DEFAULT_MAX_STORE_BYTES};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// seglog command-line log tools.
#[derive(Parser)]
#[command(name = "seglog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Maximum store file size per segment
    #[arg(global = true, long, default_value_t = DEFAULT_MAX_STORE_BYTES)]
    max_store_bytes: u64,

    /// Maximum index file size per segment
    #[arg(global = true, long, default_value_t = DEFAULT_MAX_INDEX_BYTES)]
    max_index_bytes: u64,

    /// Offset of the first record of a new log
    #[arg(global = true, long, default_value_t = 0)]
    initial_offset: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append records (one per argument, or one per stdin line)
    Produce {
        /// Record payloads
        payloads: Vec<String>,
    },

    /// Print records starting at an offset
    Consume {
        /// First offset to print (defaults to the lowest offset)
        #[arg(short, long)]
        offset: Option<u64>,

        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Keep waiting for new records
        #[arg(short, long)]
        follow: bool,
    },

    /// Decode every frame of every segment
    Dump {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Remove segments whose records are all below an offset
    Truncate {
        /// Lowest offset to keep
        #[arg(short, long)]
        lowest: u64,
    },

    /// Display segment layout and offsets
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Read back every record and report damage
    Verify,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so record output stays clean.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::new()
        .max_store_bytes(cli.max_store_bytes)
        .max_index_bytes(cli.max_index_bytes)
        .initial_offset(cli.initial_offset);

    match cli.command {
        Commands::Produce { payloads } => {
            let path = cli.path.ok_or("Log path required for produce")?;
            commands::produce::run(&path, config, &payloads)?;
        }
        Commands::Consume {
            offset,
            limit,
            follow,
        } => {
            let path = cli.path.ok_or("Log path required for consume")?;
            commands::consume::run(&path, config, offset, limit, follow)?;
        }
        Commands::Dump { format } => {
            let path = cli.path.ok_or("Log path required for dump")?;
            commands::dump::run(&path, config, &format)?;
        }
        Commands::Truncate { lowest } => {
            let path = cli.path.ok_or("Log path required for truncate")?;
            commands::truncate::run(&path, config, lowest)?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Log path required for inspect")?;
            commands::inspect::run(&path, config, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Log path required for verify")?;
            commands::verify::run(&path, config)?;
        }
        Commands::Version => {
            println!("seglog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("seglog core v{}", seglog_core::VERSION);
        }
    }

    Ok(())
}
