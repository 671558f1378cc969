use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "gransync",
    version = env!("GRANSYNC_VERSION"),
    about = "Copy Granola meeting transcripts for one project into a shared cloud-drive folder"
)]
pub struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Display timestamps in UTC instead of local time
    #[arg(long, global = true)]
    pub utc: bool,

    /// Use a specific data directory (config, state, lock) instead of the default
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Use a specific API token instead of reading from Granola's config
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Enable verbose output for debugging API calls, location search, and errors
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Defaults to `run`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Deliver new project transcripts to the shared folder
    Run {
        /// Show what would be delivered without fetching transcripts or writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show what has been synced so far and whether a run is in progress
    Status,

    /// Find the output folder and print it, without syncing
    Locate,
}

impl Cli {
    pub fn command(&self) -> Commands {
        match &self.command {
            Some(Commands::Run { dry_run }) => Commands::Run { dry_run: *dry_run },
            Some(Commands::Status) => Commands::Status,
            Some(Commands::Locate) => Commands::Locate,
            None => Commands::Run { dry_run: false },
        }
    }
}
