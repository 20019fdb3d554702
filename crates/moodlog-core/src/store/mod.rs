//! Store contracts consumed by the sync engine.
//!
//! The local store is the on-device journal table ([`crate::services::JournalService`]).
//! The remote store is a per-user document collection addressed as
//! `users/{userId}/journals/{remoteId}`.

mod firestore;
mod memory;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use crate::models::{EntryFields, EntryId, JournalEntry, RemoteJournal};
use crate::Result;

pub use firestore::{FirestoreConfig, FirestoreJournalStore};
pub use memory::MemoryRemoteStore;

/// Errors returned by a remote journal store
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote id is missing for this journal entry")]
    MissingRemoteId,
    #[error("Remote store is not configured: {0}")]
    NotConfigured(String),
    #[error("Remote store is unavailable: {0}")]
    Unavailable(String),
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {0}")]
    Api(String),
    #[error("Invalid remote document: {0}")]
    InvalidDocument(String),
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Reject blank remote ids before addressing a document.
pub fn require_remote_id(remote_id: &str) -> RemoteResult<&str> {
    let remote_id = remote_id.trim();
    if remote_id.is_empty() {
        Err(RemoteError::MissingRemoteId)
    } else {
        Ok(remote_id)
    }
}

/// One full read of a user's collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteListing {
    /// Readable documents, ordered by entry date ascending
    pub journals: Vec<RemoteJournal>,
    /// Ids of documents that exist but could not be decoded
    pub skipped_ids: Vec<String>,
    /// Undecodable documents whose id could not be read either
    pub unidentified: usize,
}

impl RemoteListing {
    /// Whether a document with this id exists, readable or not
    #[must_use]
    pub fn contains(&self, remote_id: &str) -> bool {
        self.journals
            .iter()
            .any(|journal| journal.remote_id == remote_id)
            || self.skipped_ids.iter().any(|id| id == remote_id)
    }

    /// Number of documents left out of `journals`
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped_ids.len() + self.unidentified
    }
}

/// Per-user cloud collection of journal documents
#[async_trait]
pub trait RemoteJournalStore: Send + Sync {
    /// Create a document and return its server-assigned id
    async fn create(&self, user_id: &str, fields: &EntryFields) -> RemoteResult<String>;

    /// Update an existing document's authored fields
    async fn update(&self, user_id: &str, remote_id: &str, fields: &EntryFields)
        -> RemoteResult<()>;

    /// Delete a document
    async fn delete(&self, user_id: &str, remote_id: &str) -> RemoteResult<()>;

    /// List every document of the user, ordered by entry date ascending
    async fn list(&self, user_id: &str) -> RemoteResult<RemoteListing>;
}

/// On-device journal table as seen by the sync engine and the authoring surface
#[async_trait]
pub trait LocalJournalStore: Send + Sync {
    async fn insert(&self, user_id: &str, fields: &EntryFields) -> Result<JournalEntry>;

    async fn insert_synced(&self, remote: &RemoteJournal) -> Result<JournalEntry>;

    async fn get(&self, id: EntryId) -> Result<Option<JournalEntry>>;

    /// Authoring edit; sets the dirty flag
    async fn update_fields(&self, id: EntryId, fields: &EntryFields) -> Result<JournalEntry>;

    /// Reconciliation overwrite; never touches tombstoned or dirty rows
    async fn apply_remote(&self, id: EntryId, fields: &EntryFields) -> Result<bool>;

    /// Soft delete
    async fn mark_deleted(&self, id: EntryId) -> Result<()>;

    /// Hard delete
    async fn purge(&self, id: EntryId) -> Result<bool>;

    /// Hard delete of a clean synced row that vanished remotely
    async fn remove_synced(&self, id: EntryId) -> Result<bool>;

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<JournalEntry>>;

    async fn list_with_tombstones(&self, user_id: &str) -> Result<Vec<JournalEntry>>;

    async fn sync_candidates(&self, user_id: &str) -> Result<Vec<JournalEntry>>;

    async fn set_remote_id(&self, id: EntryId, remote_id: &str) -> Result<bool>;

    async fn clear_needs_update(&self, id: EntryId, revision: i64) -> Result<bool>;

    /// Change feed: the value advances after every committed mutation
    fn subscribe(&self) -> watch::Receiver<u64>;
}
