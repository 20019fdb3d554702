//! Data models for MoodLog

mod entry;
mod mood;

pub use entry::{EntryFields, EntryId, JournalEntry, Location, RemoteJournal, SyncAction};
pub use mood::Mood;
