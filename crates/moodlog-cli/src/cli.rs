use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use moodlog_core::Mood;

#[derive(Parser)]
#[command(name = "moodlog")]
#[command(about = "Keep a mood journal from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// User id whose journal is used
    #[arg(long, global = true, value_name = "ID")]
    pub user: Option<String>,

    /// Quick entry: moodlog "today was fine"
    #[arg(trailing_var_arg = true)]
    pub entry: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a new journal entry
    #[command(alias = "new")]
    Add {
        /// Entry content
        content: Vec<String>,
        #[command(flatten)]
        options: AddOptions,
    },
    /// List recent journal entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing entry
    Edit {
        /// Entry ID
        id: String,
        /// Replacement content (opens $EDITOR when neither content nor mood is given)
        #[arg(long)]
        content: Option<String>,
        /// Replacement mood
        #[arg(short, long)]
        mood: Option<Mood>,
    },
    /// Delete an entry
    Delete {
        /// Entry ID
        id: String,
    },
    /// Show entries waiting to be synced
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reconcile with the cloud and push pending entries once
    Sync,
    /// Keep syncing local changes until interrupted
    Watch,
    /// List accepted mood names
    Moods,
}

#[derive(Args, Clone, Debug, Default, PartialEq)]
pub struct AddOptions {
    /// Mood name or slider position 0-4
    #[arg(short, long)]
    pub mood: Option<Mood>,
    /// Entry date as Unix milliseconds (defaults to now)
    #[arg(long, value_name = "MS")]
    pub date: Option<i64>,
    /// Geotag latitude
    #[arg(long, requires = "longitude", allow_negative_numbers = true)]
    pub latitude: Option<f64>,
    /// Geotag longitude
    #[arg(long, requires = "latitude", allow_negative_numbers = true)]
    pub longitude: Option<f64>,
    /// Geotag address
    #[arg(long, requires = "latitude")]
    pub address: Option<String>,
}
