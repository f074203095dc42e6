use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "gallery-indexer")]
#[command(about = "Periodically indexes image files into a searchable store", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Index at startup, then on the configured schedule until stopped
    Serve,
    /// Run a single indexing pass and exit
    Run,
    /// Show whether an indexing run is active and when the last one finished
    Status,
    /// List indexing jobs, most recent first
    History {
        /// failed, completed, running or all
        #[arg(long, default_value = "all")]
        status: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Search indexed files by name
    Search {
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
        /// asc or desc
        #[arg(long, default_value = "asc")]
        sort: String,
    },
    /// Display the number of indexed files
    Count,
    /// Print configuration values
    PrintConfig,
}
