use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    version = env!("CARGO_PKG_VERSION"),
    about = "abbrv - expand abbreviations as you type",
    long_about = "abbrv watches your typing and replaces registered abbreviations with their expansions."
)]
pub struct Abbrv {
    /// Use this data file instead of ~/.abbrv/config.abbrv
    #[clap(long, global = true, value_name = "PATH")]
    pub file: Option<PathBuf>,

    #[clap(subcommand)]
    pub commands: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a new abbreviation
    Add {
        #[clap(long, short = 'a', help = "Text to watch for")]
        abbreviation: String,

        #[clap(long, short = 'e', help = "Text typed in its place")]
        expansion: String,

        #[clap(long, help = "Mark the expansion as spanning several lines")]
        multiline: bool,

        #[clap(long, help = "Mask the expansion in listings")]
        hidden: bool,
    },
    /// Replace the expansion of an abbreviation
    Update {
        #[clap(long, short = 'a', help = "Abbreviation to update")]
        abbreviation: String,

        #[clap(long, short = 'e', help = "New expansion")]
        expansion: String,
    },
    /// Delete an abbreviation
    Delete {
        #[clap(long, short = 'a', help = "Abbreviation to delete")]
        abbreviation: String,
    },
    /// Flip the multiline flag of an abbreviation
    ToggleMultiline {
        #[clap(long, short = 'a')]
        abbreviation: String,
    },
    /// Flip the hidden flag of an abbreviation
    ToggleHidden {
        #[clap(long, short = 'a')]
        abbreviation: String,
    },
    /// List all abbreviations
    List,
    /// Show which expansions typing TEXT would trigger, without typing anything
    Check { text: String },
    /// Start the background expander
    Start,
    /// Stop the background expander
    Stop,
    /// Check the status of the background expander
    Status,
    // Hidden command used internally to run the daemon worker
    #[clap(hide = true)]
    DaemonWorker,
}
