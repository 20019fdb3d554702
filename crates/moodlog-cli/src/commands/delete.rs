use moodlog_core::LocalJournalStore;

use crate::commands::common::{find_visible_entry, parse_entry_id, AppContext};
use crate::error::CliError;

pub async fn run_delete(ctx: &AppContext, id: &str) -> Result<(), CliError> {
    let user_id = ctx.require_user()?;
    let entry_id = parse_entry_id(id)?;
    let service = ctx.open_service()?;
    let entry = find_visible_entry(&service, user_id, entry_id).await?;

    service.mark_deleted(entry.id).await?;
    println!("{}", entry.id);
    Ok(())
}
