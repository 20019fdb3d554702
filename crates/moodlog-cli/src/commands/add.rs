use moodlog_core::{EntryFields, LocalJournalStore, Location};

use crate::cli::AddOptions;
use crate::commands::common::{resolve_entry_content, AppContext};
use crate::error::CliError;

pub async fn run_add(
    ctx: &AppContext,
    content_parts: &[String],
    options: &AddOptions,
) -> Result<(), CliError> {
    let user_id = ctx.require_user()?;
    let content = resolve_entry_content(content_parts)?;
    let fields = build_entry_fields(content, options);

    let service = ctx.open_service()?;
    let entry = service.insert(user_id, &fields).await?;

    println!("{}", entry.id);
    Ok(())
}

pub fn build_entry_fields(content: String, options: &AddOptions) -> EntryFields {
    let mut fields = EntryFields::new(content, options.mood.unwrap_or_default());
    if let Some(date) = options.date {
        fields.date = date.to_string();
        fields.time = date.to_string();
    }
    if let (Some(latitude), Some(longitude)) = (options.latitude, options.longitude) {
        let address = options.address.clone().unwrap_or_default();
        if let Some(location) = Location::from_parts(latitude, longitude, address) {
            fields = fields.with_location(location);
        }
    }
    fields
}
