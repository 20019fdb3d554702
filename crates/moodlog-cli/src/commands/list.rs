use moodlog_core::LocalJournalStore;

use crate::commands::common::{entry_to_list_item, format_entry_lines, AppContext, EntryListItem};
use crate::error::CliError;

pub async fn run_list(ctx: &AppContext, limit: usize, as_json: bool) -> Result<(), CliError> {
    let user_id = ctx.require_user()?;
    let service = ctx.open_service()?;
    let mut entries = service.list_for_user(user_id).await?;
    entries.truncate(limit);

    if as_json {
        let json_items = entries
            .iter()
            .map(entry_to_list_item)
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_entry_lines(&entries) {
            println!("{line}");
        }
    }

    Ok(())
}
