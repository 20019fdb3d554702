use moodlog_core::{SyncReport, SyncState};

use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_sync(ctx: &AppContext) -> Result<(), CliError> {
    let engine = ctx.sync_engine()?;
    let report = engine.run_once().await?;

    println!("{}", format_sync_report(&report));
    if report.push.failed > 0 {
        return Err(CliError::SyncIncomplete(report.push.failed));
    }
    Ok(())
}

pub async fn run_watch(ctx: &AppContext) -> Result<(), CliError> {
    let engine = ctx.sync_engine()?;
    let mut state = engine.state();
    if !engine.start() {
        return Err(CliError::NoUser);
    }
    println!("Watching for journal changes. Press Ctrl-C to stop.");

    let printer = tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            if current != SyncState::Offline {
                println!("Sync state: {current}");
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    engine.stop().await;
    printer.abort();
    println!("Sync stopped");
    Ok(())
}

pub fn format_sync_report(report: &SyncReport) -> String {
    let pulled = &report.reconcile;
    let pushed = &report.push;
    let mut summary = format!(
        "Pulled {} new, {} updated, {} removed; pushed {} created, {} updated, {} deleted, {} purged",
        pulled.inserted,
        pulled.updated,
        pulled.removed,
        pushed.created,
        pushed.updated,
        pushed.deleted,
        pushed.purged
    );
    if pulled.skipped_unreadable > 0 {
        summary.push_str(&format!(
            "; {} unreadable remote entries kept as they are",
            pulled.skipped_unreadable
        ));
    }
    if pushed.failed > 0 {
        summary.push_str(&format!("; {} failed", pushed.failed));
    }
    summary
}
