//! moodlog-core - Core library for MoodLog
//!
//! This crate contains the journal models, the on-device SQLite store, the
//! remote store adapters, and the sync engine shared by MoodLog clients.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

pub use auth::{IdentityProvider, SessionIdentity};
pub use config::MoodLogConfig;
pub use error::{Error, Result};
pub use models::{EntryFields, EntryId, JournalEntry, Location, Mood, RemoteJournal, SyncAction};
pub use services::JournalService;
pub use state::SyncState;
pub use store::{
    FirestoreConfig, FirestoreJournalStore, LocalJournalStore, MemoryRemoteStore, RemoteError,
    RemoteJournalStore, RemoteListing,
};
pub use sync::{PushReport, ReconcileReport, SyncEngine, SyncReport};
