//! Shared journal store service used by the sync engine and the authoring surface.

use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;

use crate::db::{Database, JournalRepository, SqliteJournalRepository};
use crate::models::{EntryFields, EntryId, JournalEntry, RemoteJournal};
use crate::store::LocalJournalStore;
use crate::Result;

/// How often a file database is checked for commits from other processes
pub const EXTERNAL_CHANGE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Thread-safe service for journal DB operations with a live change feed.
///
/// Services opened on a file also advance the feed when another connection
/// (for example a second `moodlog` process) commits to the same database.
#[derive(Clone)]
pub struct JournalService {
    db: Arc<Mutex<Database>>,
    changes: Arc<watch::Sender<u64>>,
}

impl JournalService {
    fn from_database(db: Database) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            db: Arc::new(Mutex::new(db)),
            changes: Arc::new(changes),
        }
    }

    /// Open a journal service at the given filesystem path.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!("Opening journal database at {}", db_path.display());
        let db = Database::open(&db_path)?;
        let data_version = db.data_version()?;
        let service = Self::from_database(db);
        service.watch_external_changes(data_version, EXTERNAL_CHANGE_POLL_INTERVAL);
        Ok(service)
    }

    /// Open an in-memory journal service (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory()?))
    }

    /// Current value of the change feed
    pub fn revision(&self) -> u64 {
        *self.changes.borrow()
    }

    fn notify(&self) {
        bump(&self.changes);
    }

    /// Poll `data_version` on the runtime until the service is dropped.
    fn watch_external_changes(&self, data_version: i64, period: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No tokio runtime, commits from other processes are not observed");
            return;
        };
        runtime.spawn(poll_data_version(
            Arc::downgrade(&self.db),
            Arc::downgrade(&self.changes),
            data_version,
            period,
        ));
    }

    fn notify_if(&self, changed: bool) -> bool {
        if changed {
            self.notify();
        }
        changed
    }
}

fn bump(changes: &watch::Sender<u64>) {
    changes.send_modify(|revision| *revision = revision.wrapping_add(1));
}

async fn poll_data_version(
    db: Weak<Mutex<Database>>,
    changes: Weak<watch::Sender<u64>>,
    mut seen: i64,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let (Some(db), Some(changes)) = (db.upgrade(), changes.upgrade()) else {
            break;
        };

        let current = db.lock().await.data_version();
        match current {
            Ok(version) if version != seen => {
                tracing::debug!("Journal database changed by another connection");
                seen = version;
                bump(&changes);
            }
            Ok(_) => {}
            Err(error) => tracing::warn!("Failed to check journal database for changes: {}", error),
        }
    }
}

#[async_trait]
impl LocalJournalStore for JournalService {
    async fn insert(&self, user_id: &str, fields: &EntryFields) -> Result<JournalEntry> {
        let entry = {
            let db = self.db.lock().await;
            SqliteJournalRepository::new(db.connection()).insert(user_id, fields)?
        };
        self.notify();
        Ok(entry)
    }

    async fn insert_synced(&self, remote: &RemoteJournal) -> Result<JournalEntry> {
        let entry = {
            let db = self.db.lock().await;
            SqliteJournalRepository::new(db.connection()).insert_synced(remote)?
        };
        self.notify();
        Ok(entry)
    }

    async fn get(&self, id: EntryId) -> Result<Option<JournalEntry>> {
        let db = self.db.lock().await;
        SqliteJournalRepository::new(db.connection()).get(id)
    }

    async fn update_fields(&self, id: EntryId, fields: &EntryFields) -> Result<JournalEntry> {
        let entry = {
            let db = self.db.lock().await;
            SqliteJournalRepository::new(db.connection()).update_fields(id, fields)?
        };
        self.notify();
        Ok(entry)
    }

    async fn apply_remote(&self, id: EntryId, fields: &EntryFields) -> Result<bool> {
        let changed = {
            let db = self.db.lock().await;
            SqliteJournalRepository::new(db.connection()).apply_remote(id, fields)?
        };
        Ok(self.notify_if(changed))
    }

    async fn mark_deleted(&self, id: EntryId) -> Result<()> {
        {
            let db = self.db.lock().await;
            SqliteJournalRepository::new(db.connection()).mark_deleted(id)?;
        }
        self.notify();
        Ok(())
    }

    async fn purge(&self, id: EntryId) -> Result<bool> {
        let changed = {
            let db = self.db.lock().await;
            SqliteJournalRepository::new(db.connection()).purge(id)?
        };
        Ok(self.notify_if(changed))
    }

    async fn remove_synced(&self, id: EntryId) -> Result<bool> {
        let changed = {
            let db = self.db.lock().await;
            SqliteJournalRepository::new(db.connection()).remove_synced(id)?
        };
        Ok(self.notify_if(changed))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<JournalEntry>> {
        let db = self.db.lock().await;
        SqliteJournalRepository::new(db.connection()).list_for_user(user_id)
    }

    async fn list_with_tombstones(&self, user_id: &str) -> Result<Vec<JournalEntry>> {
        let db = self.db.lock().await;
        SqliteJournalRepository::new(db.connection()).list_with_tombstones(user_id)
    }

    async fn sync_candidates(&self, user_id: &str) -> Result<Vec<JournalEntry>> {
        let db = self.db.lock().await;
        SqliteJournalRepository::new(db.connection()).sync_candidates(user_id)
    }

    async fn set_remote_id(&self, id: EntryId, remote_id: &str) -> Result<bool> {
        let changed = {
            let db = self.db.lock().await;
            SqliteJournalRepository::new(db.connection()).set_remote_id(id, remote_id)?
        };
        Ok(self.notify_if(changed))
    }

    async fn clear_needs_update(&self, id: EntryId, revision: i64) -> Result<bool> {
        let changed = {
            let db = self.db.lock().await;
            SqliteJournalRepository::new(db.connection()).clear_needs_update(id, revision)?
        };
        Ok(self.notify_if(changed))
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}
