use moodlog_core::LocalJournalStore;

use crate::commands::common::{format_pending_lines, pending_to_item, AppContext, PendingItem};
use crate::error::CliError;

pub async fn run_pending(ctx: &AppContext, as_json: bool) -> Result<(), CliError> {
    let user_id = ctx.require_user()?;
    let service = ctx.open_service()?;
    let candidates = service.sync_candidates(user_id).await?;

    if as_json {
        let json_items = candidates
            .iter()
            .filter_map(pending_to_item)
            .collect::<Vec<PendingItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if candidates.is_empty() {
        println!("Everything is synced.");
        return Ok(());
    }

    for line in format_pending_lines(&candidates) {
        println!("{line}");
    }
    Ok(())
}
