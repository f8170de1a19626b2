//! Command line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Media Parser - Recognize movie and episode metadata from filenames
#[derive(Parser, Debug)]
#[command(name = "media-parser")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip preflight checks
    #[arg(long, global = true)]
    pub skip_preflight: bool,

    /// Pattern database (overrides [store] database in config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Recognize a single filename
    Parse {
        /// Filename (directories are ignored)
        #[arg(value_name = "FILENAME")]
        filename: String,

        /// Rules and learned patterns only, never ask the AI
        #[arg(long)]
        no_ai: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recognize many filenames, keeping input order
    Batch {
        /// Filenames to recognize
        #[arg(value_name = "FILENAMES")]
        filenames: Vec<String>,

        /// Read additional filenames from a file, one per line
        #[arg(short, long, value_name = "PATH")]
        from_file: Option<PathBuf>,

        /// Rules and learned patterns only, never ask the AI
        #[arg(long)]
        no_ai: bool,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Learn a confirmed filename -> metadata mapping
    Learn {
        /// Confirmed filename
        #[arg(value_name = "FILENAME")]
        filename: String,

        /// Id of the confirmed movie or series record
        #[arg(long)]
        metadata_id: String,

        /// Kind of the record: movie or series
        #[arg(long, value_name = "TYPE")]
        metadata_type: String,

        /// TMDB id of the record
        #[arg(long)]
        tmdb_id: Option<u64>,
    },

    /// Look up the learned pattern for a filename
    Match {
        /// Filename to look up
        #[arg(value_name = "FILENAME")]
        filename: String,
    },

    /// Manage learned patterns
    Patterns {
        #[command(subcommand)]
        action: PatternsAction,
    },
}

impl Commands {
    /// Whether the command may call the AI fallback.
    pub fn wants_ai(&self) -> bool {
        match self {
            Commands::Parse { no_ai, .. } | Commands::Batch { no_ai, .. } => !no_ai,
            _ => false,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum PatternsAction {
    /// List learned patterns, most used first
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show aggregate counters
    Stats,

    /// Delete a learned pattern
    Delete {
        /// Pattern id
        #[arg(value_name = "ID")]
        id: String,
    },
}
