//! In-process remote journal store.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{require_remote_id, RemoteError, RemoteJournalStore, RemoteListing, RemoteResult};
use crate::models::{EntryFields, RemoteJournal};

/// Number of calls received per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteCallCounts {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub lists: usize,
}

impl RemoteCallCounts {
    /// Calls that wrote to the collection
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.creates + self.updates + self.deletes
    }
}

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    offline: bool,
    calls: RemoteCallCounts,
    collections: HashMap<String, BTreeMap<String, RemoteJournal>>,
    /// Documents present in the collection that no client can decode
    unreadable: HashMap<String, BTreeSet<String>>,
}

/// Remote store that keeps documents in memory.
///
/// Behaves like the cloud collection (server-assigned ids, per-user
/// partitions, date-ordered listing) and can be switched offline.
#[derive(Default)]
pub struct MemoryRemoteStore {
    state: Mutex<MemoryState>,
}

impl MemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every following call fail with `RemoteError::Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Snapshot of received call counts
    pub fn calls(&self) -> RemoteCallCounts {
        self.state().calls
    }

    /// Documents of a user, ordered by date
    pub fn documents(&self, user_id: &str) -> Vec<RemoteJournal> {
        sorted_documents(&self.state(), user_id)
    }

    /// Fetch a single document
    pub fn document(&self, user_id: &str, remote_id: &str) -> Option<RemoteJournal> {
        self.state()
            .collections
            .get(user_id)
            .and_then(|docs| docs.get(remote_id))
            .cloned()
    }

    /// Write a document directly, as another device would. Not counted as a call.
    pub fn seed(&self, user_id: &str, fields: EntryFields) -> String {
        let mut state = self.state();
        let remote_id = next_remote_id(&mut state);
        state.collections.entry(user_id.to_string()).or_default().insert(
            remote_id.clone(),
            RemoteJournal {
                remote_id: remote_id.clone(),
                user_id: user_id.to_string(),
                fields,
            },
        );
        remote_id
    }

    /// Remove a document directly, as another device would. Not counted as a call.
    pub fn remove(&self, user_id: &str, remote_id: &str) -> bool {
        let mut state = self.state();
        let unreadable = state
            .unreadable
            .get_mut(user_id)
            .is_some_and(|ids| ids.remove(remote_id));
        let readable = state
            .collections
            .get_mut(user_id)
            .is_some_and(|docs| docs.remove(remote_id).is_some());
        unreadable || readable
    }

    /// Keep a document in the collection but make it undecodable, as a newer
    /// client writing an unknown schema would. Not counted as a call.
    pub fn corrupt(&self, user_id: &str, remote_id: &str) -> bool {
        let mut state = self.state();
        let existed = state
            .collections
            .get_mut(user_id)
            .is_some_and(|docs| docs.remove(remote_id).is_some());
        if existed {
            state
                .unreadable
                .entry(user_id.to_string())
                .or_default()
                .insert(remote_id.to_string());
        }
        existed
    }

    fn ensure_online(state: &MemoryState) -> RemoteResult<()> {
        if state.offline {
            Err(RemoteError::Unavailable("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

fn next_remote_id(state: &mut MemoryState) -> String {
    state.next_id += 1;
    format!("mem-{:06}", state.next_id)
}

fn sorted_documents(state: &MemoryState, user_id: &str) -> Vec<RemoteJournal> {
    let mut documents = state
        .collections
        .get(user_id)
        .map(|docs| docs.values().cloned().collect::<Vec<_>>())
        .unwrap_or_default();
    documents.sort_by(|a, b| {
        a.fields
            .date_millis()
            .cmp(&b.fields.date_millis())
            .then_with(|| a.remote_id.cmp(&b.remote_id))
    });
    documents
}

#[async_trait]
impl RemoteJournalStore for MemoryRemoteStore {
    async fn create(&self, user_id: &str, fields: &EntryFields) -> RemoteResult<String> {
        let mut state = self.state();
        state.calls.creates += 1;
        Self::ensure_online(&state)?;

        let remote_id = next_remote_id(&mut state);
        state.collections.entry(user_id.to_string()).or_default().insert(
            remote_id.clone(),
            RemoteJournal {
                remote_id: remote_id.clone(),
                user_id: user_id.to_string(),
                fields: fields.clone(),
            },
        );
        Ok(remote_id)
    }

    async fn update(
        &self,
        user_id: &str,
        remote_id: &str,
        fields: &EntryFields,
    ) -> RemoteResult<()> {
        let mut state = self.state();
        state.calls.updates += 1;
        Self::ensure_online(&state)?;
        let remote_id = require_remote_id(remote_id)?;

        let document = state
            .collections
            .get_mut(user_id)
            .and_then(|docs| docs.get_mut(remote_id))
            .ok_or_else(|| RemoteError::Api(format!("document {remote_id} not found")))?;
        document.fields = fields.clone();
        Ok(())
    }

    async fn delete(&self, user_id: &str, remote_id: &str) -> RemoteResult<()> {
        let mut state = self.state();
        state.calls.deletes += 1;
        Self::ensure_online(&state)?;
        let remote_id = require_remote_id(remote_id)?;

        if let Some(docs) = state.collections.get_mut(user_id) {
            docs.remove(remote_id);
        }
        if let Some(ids) = state.unreadable.get_mut(user_id) {
            ids.remove(remote_id);
        }
        Ok(())
    }

    async fn list(&self, user_id: &str) -> RemoteResult<RemoteListing> {
        let mut state = self.state();
        state.calls.lists += 1;
        Self::ensure_online(&state)?;
        Ok(RemoteListing {
            journals: sorted_documents(&state, user_id),
            skipped_ids: state
                .unreadable
                .get(user_id)
                .map(|ids| ids.iter().cloned().collect())
                .unwrap_or_default(),
            unidentified: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Mood;

    fn fields(content: &str, date: &str) -> EntryFields {
        EntryFields::new(content, Mood::Neutral).with_date(date)
    }

    #[tokio::test]
    async fn create_assigns_unique_ids_per_call() {
        let store = MemoryRemoteStore::new();
        let first = store.create("user-1", &fields("A", "1")).await.unwrap();
        let second = store.create("user-1", &fields("B", "2")).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(store.documents("user-1").len(), 2);
        assert!(store.documents("user-2").is_empty());
        assert_eq!(store.calls().creates, 2);
    }

    #[tokio::test]
    async fn list_orders_by_date_ascending() {
        let store = MemoryRemoteStore::new();
        store.seed("user-1", fields("late", "3000"));
        store.seed("user-1", fields("early", "1000"));
        store.seed("user-1", fields("middle", "2000"));

        let contents = store
            .list("user-1")
            .await
            .unwrap()
            .journals
            .into_iter()
            .map(|doc| doc.fields.content)
            .collect::<Vec<_>>();
        assert_eq!(contents, vec!["early", "middle", "late"]);
    }

    #[tokio::test]
    async fn offline_store_rejects_calls() {
        let store = MemoryRemoteStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.create("user-1", &fields("A", "1")).await,
            Err(RemoteError::Unavailable(_))
        ));
        assert!(store.documents("user-1").is_empty());

        store.set_offline(false);
        assert!(store.create("user-1", &fields("A", "1")).await.is_ok());
    }

    #[tokio::test]
    async fn update_and_delete_require_remote_id() {
        let store = MemoryRemoteStore::new();
        assert!(matches!(
            store.update("user-1", "", &fields("A", "1")).await,
            Err(RemoteError::MissingRemoteId)
        ));
        assert!(matches!(
            store.delete("user-1", " ").await,
            Err(RemoteError::MissingRemoteId)
        ));
    }

    #[tokio::test]
    async fn update_missing_document_is_an_error() {
        let store = MemoryRemoteStore::new();
        assert!(matches!(
            store.update("user-1", "nope", &fields("A", "1")).await,
            Err(RemoteError::Api(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_document() {
        let store = MemoryRemoteStore::new();
        let remote_id = store.create("user-1", &fields("A", "1")).await.unwrap();
        store.delete("user-1", &remote_id).await.unwrap();
        assert!(store.document("user-1", &remote_id).is_none());
        // Deleting again is fine
        store.delete("user-1", &remote_id).await.unwrap();
    }

    #[tokio::test]
    async fn corrupted_document_is_listed_as_skipped() {
        let store = MemoryRemoteStore::new();
        let kept = store.seed("user-1", fields("A", "1"));
        let broken = store.seed("user-1", fields("B", "2"));
        assert!(store.corrupt("user-1", &broken));
        assert!(!store.corrupt("user-1", "missing"));

        let listing = store.list("user-1").await.unwrap();
        assert_eq!(listing.journals.len(), 1);
        assert_eq!(listing.journals[0].remote_id, kept);
        assert_eq!(listing.skipped_ids, vec![broken.clone()]);

        assert!(store.remove("user-1", &broken));
        assert!(store.list("user-1").await.unwrap().skipped_ids.is_empty());
    }
}
