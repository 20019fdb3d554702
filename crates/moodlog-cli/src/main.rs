//! MoodLog CLI - Command-line interface for the MoodLog journal
//!
//! Write entries, inspect what is waiting to sync, and sync with Firestore.

mod cli;
mod commands;
mod error;

use clap::{CommandFactory, Parser};

use crate::cli::{AddOptions, Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::AppContext;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::moods::run_moods;
use crate::commands::pending::run_pending;
use crate::commands::sync::{run_sync, run_watch};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "moodlog=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = AppContext::resolve(cli.db_path, cli.config, cli.user);

    match cli.command {
        Some(Commands::Add { content, options }) => run_add(&ctx, &content, &options).await?,
        Some(Commands::List { limit, json }) => run_list(&ctx, limit, json).await?,
        Some(Commands::Edit { id, content, mood }) => {
            run_edit(&ctx, &id, content.as_deref(), mood).await?;
        }
        Some(Commands::Delete { id }) => run_delete(&ctx, &id).await?,
        Some(Commands::Pending { json }) => run_pending(&ctx, json).await?,
        Some(Commands::Sync) => run_sync(&ctx).await?,
        Some(Commands::Watch) => run_watch(&ctx).await?,
        Some(Commands::Moods) => run_moods(),
        None => {
            // Quick entry mode: moodlog "today was fine"
            if cli.entry.is_empty() {
                Cli::command().print_help().map_err(CliError::Io)?;
                println!();
            } else {
                run_add(&ctx, &cli.entry, &AddOptions::default()).await?;
            }
        }
    }

    Ok(())
}
