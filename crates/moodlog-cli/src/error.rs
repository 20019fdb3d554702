use std::io;

use moodlog_core::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] moodlog_core::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No entry content provided")]
    EmptyContent,
    #[error("Edited entry content cannot be empty")]
    EmptyEditedContent,
    #[error("Invalid entry ID: {0}")]
    InvalidEntryId(String),
    #[error("Entry not found: {0}")]
    EntryNotFound(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("No user selected. Pass --user or set MOODLOG_USER_ID.")]
    NoUser,
    #[error(
        "Sync is not configured. Set MOODLOG_FIRESTORE_PROJECT_ID and MOODLOG_FIRESTORE_ID_TOKEN, or add firestore_project_id to the config file."
    )]
    SyncNotConfigured,
    #[error("Sync finished with {0} entries still pending")]
    SyncIncomplete(usize),
}
