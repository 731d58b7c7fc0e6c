//! Command-line definitions for the `npr` binary

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// NPR - National Provider Registry ingest tool
#[derive(Parser, Debug)]
#[command(name = "npr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding the provider store (overrides NPR_DATA_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Print the CLI reference as markdown and exit
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an empty provider store if none exists
    Init,

    /// Fetch all configured sources and store new providers
    Fetch,

    /// Clear the store, then fetch all sources
    Refresh,

    /// List stored providers
    List {
        /// Show at most this many providers
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one provider
    Show {
        /// Provider NPI
        npi: String,
    },

    /// Search providers by name (case-insensitive substring)
    Search {
        /// Text to look for
        text: String,
    },

    /// Add a provider by hand
    Add {
        /// Provider NPI
        #[arg(long)]
        npi: String,

        /// Provider or organisation name
        #[arg(long)]
        name: String,

        #[command(flatten)]
        fields: ProviderFields,
    },

    /// Change fields of a stored provider
    Update {
        /// NPI of the provider to change
        npi: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        fields: ProviderFields,
    },

    /// Remove a provider
    Delete {
        /// Provider NPI
        npi: String,
    },

    /// Remove every provider from the store
    Clear {
        /// Confirm the operation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show store totals per source
    Stats,

    /// Check an NPI's format and check digit
    Validate {
        /// Identifier to check
        npi: String,
    },

    /// Derive a full NPI from a 9-digit base
    Generate {
        /// Nine digit base
        base: String,
    },
}

/// Optional provider fields shared by `add` and `update`
#[derive(Args, Debug, Default, Clone)]
pub struct ProviderFields {
    /// Credential (MD, DO, NP, ...)
    #[arg(long)]
    pub credential: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,

    /// Street address
    #[arg(long)]
    pub address: Option<String>,

    #[arg(long)]
    pub city: Option<String>,

    #[arg(long)]
    pub state: Option<String>,

    #[arg(long)]
    pub postal_code: Option<String>,

    #[arg(long)]
    pub specialty: Option<String>,
}
