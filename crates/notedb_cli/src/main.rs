//! notedb CLI
//!
//! Command-line tools for notedb stores.
//!
//! # Commands
//!
//! - `ingest` - Load newline-delimited event JSON
//! - `query` - Run a NIP-01 filter
//! - `search` - Full-text search over text notes
//! - `stat` - Display store footprint and operation counters
//! - `reactions` - Tally reactions to a note
//! - `zaps` - Count and sum zap receipts for a note
//! - `thread` - Show the root and parent a note replies to

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// notedb command-line store tools.
#[derive(Parser)]
#[command(name = "notedb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Store options as JSON, e.g. '{"mapsize":1073741824,"ingester_threads":4}'
    #[arg(global = true, short, long)]
    options: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load newline-delimited event JSON from a file or stdin
    Ingest {
        /// Input file (stdin if omitted)
        file: Option<PathBuf>,

        /// Repair and submit each line on its own instead of as one batch
        #[arg(short, long)]
        repair: bool,

        /// Seconds to wait for submitted events to be stored
        #[arg(short, long, default_value = "60")]
        timeout: u64,
    },

    /// Run a filter and print matching events, one per line
    Query {
        /// Filter object or array of filters
        filter: String,
    },

    /// Full-text search over text notes and articles
    Search {
        /// Search terms; the last may be a prefix
        query: String,

        /// Maximum number of results (1-1024)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Oldest first
        #[arg(short, long)]
        ascending: bool,
    },

    /// Display store footprint and operation counters
    Stat {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Tally reactions to a note
    Reactions {
        /// Note id as 64 hex characters
        id: String,

        /// List reacting pubkeys
        #[arg(short, long)]
        reactors: bool,
    },

    /// Count and sum zap receipts for a note
    Zaps {
        /// Note id as 64 hex characters
        id: String,
    },

    /// Show the root and parent a note replies to
    Thread {
        /// Note id as 64 hex characters
        id: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let options = cli.options.as_deref();
    match cli.command {
        Commands::Ingest {
            file,
            repair,
            timeout,
        } => {
            let path = cli.path.ok_or("Store path required for ingest")?;
            commands::ingest::run(&path, options, file.as_deref(), repair, timeout)?;
        }
        Commands::Query { filter } => {
            let path = cli.path.ok_or("Store path required for query")?;
            commands::query::run(&path, options, &filter)?;
        }
        Commands::Search {
            query,
            limit,
            ascending,
        } => {
            let path = cli.path.ok_or("Store path required for search")?;
            commands::search::run(&path, options, &query, limit, ascending)?;
        }
        Commands::Stat { format } => {
            let path = cli.path.ok_or("Store path required for stat")?;
            commands::stat::run(&path, options, &format)?;
        }
        Commands::Reactions { id, reactors } => {
            let path = cli.path.ok_or("Store path required for reactions")?;
            commands::reactions::run(&path, options, &id, reactors)?;
        }
        Commands::Zaps { id } => {
            let path = cli.path.ok_or("Store path required for zaps")?;
            commands::zaps::run(&path, options, &id)?;
        }
        Commands::Thread { id } => {
            let path = cli.path.ok_or("Store path required for thread")?;
            commands::thread::run(&path, options, &id)?;
        }
        Commands::Version => {
            println!("notedb CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("notedb core v{}", notedb_core::VERSION);
        }
    }

    Ok(())
}
