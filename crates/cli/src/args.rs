//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// feed-relay: relay media posts from a source feed to a destination platform
#[derive(Parser, Debug)]
#[command(name = "feed-relay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the source feed and relay new posts
    Run(RunArgs),

    /// Normalize caption text into a title
    Normalize(NormalizeArgs),

    /// Inspect or edit the ledger of relayed items
    Ledger(LedgerArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run in dry-run mode (no publishing, no ledger writes)
    #[arg(long)]
    pub dry_run: bool,

    /// Process one scan cycle and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Text to normalize
    #[arg(long, conflicts_with = "file")]
    pub text: Option<String>,

    /// File containing text to normalize (use - for stdin)
    #[arg(long, conflicts_with = "text")]
    pub file: Option<PathBuf>,

    /// Keep everything before the first colon
    #[arg(long)]
    pub no_strip_prefix: bool,

    /// Do not cap long titles
    #[arg(long)]
    pub no_cap: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct LedgerArgs {
    #[command(subcommand)]
    pub command: LedgerCommands,
}

#[derive(Subcommand, Debug)]
pub enum LedgerCommands {
    /// List ledger entries (posted by default)
    List {
        /// List observed items that were never posted
        #[arg(long)]
        unposted: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark a source URI as posted so it is never relayed
    Mark {
        /// Source item URI
        uri: String,
    },
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
