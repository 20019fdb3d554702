use moodlog_core::{LocalJournalStore, Mood};

use crate::commands::common::{
    capture_editor_input, find_visible_entry, normalize_content, parse_entry_id, AppContext,
};
use crate::error::CliError;

pub async fn run_edit(
    ctx: &AppContext,
    id: &str,
    content: Option<&str>,
    mood: Option<Mood>,
) -> Result<(), CliError> {
    let user_id = ctx.require_user()?;
    let entry_id = parse_entry_id(id)?;
    let service = ctx.open_service()?;
    let entry = find_visible_entry(&service, user_id, entry_id).await?;

    let mut fields = entry.fields.clone();
    match content {
        Some(content) => {
            fields.content = normalize_content(content).ok_or(CliError::EmptyEditedContent)?;
        }
        None if mood.is_none() => {
            fields.content = capture_editor_input(&entry.fields.content)?
                .ok_or(CliError::EmptyEditedContent)?;
        }
        None => {}
    }
    if let Some(mood) = mood {
        fields.mood = mood;
    }

    if fields == entry.fields {
        println!("{}", entry.id);
        return Ok(());
    }

    let updated = service.update_fields(entry.id, &fields).await?;
    println!("{}", updated.id);
    Ok(())
}
