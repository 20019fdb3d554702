//! Bidirectional journal sync between the local store and the remote collection.
//!
//! A session first reconciles (remote to local), then follows the local change
//! feed and pushes every pending entry (local to remote). Newer snapshots of
//! the candidate view supersede older ones at entry boundaries.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::IdentityProvider;
use crate::models::{JournalEntry, SyncAction};
use crate::state::SyncState;
use crate::store::{LocalJournalStore, RemoteJournalStore};
use crate::{Error, Result};

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Remote documents inserted locally
    pub inserted: usize,
    /// Local rows overwritten with remote values
    pub updated: usize,
    /// Remote documents already matching their local row
    pub unchanged: usize,
    /// Overwrites suppressed by a local tombstone
    pub skipped_tombstoned: usize,
    /// Overwrites suppressed by an unpushed local edit
    pub skipped_dirty: usize,
    /// Clean local rows whose document no longer exists remotely
    pub removed: usize,
    /// Remote documents that could not be decoded
    pub skipped_unreadable: usize,
}

impl ReconcileReport {
    /// Number of local writes performed
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.inserted + self.updated + self.removed
    }
}

/// Outcome of pushing the candidate view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub purged: usize,
    /// Entries left untouched after a failure
    pub failed: usize,
    /// Snapshots abandoned because the local store changed
    pub superseded: usize,
}

impl PushReport {
    #[must_use]
    pub const fn pushed(&self) -> usize {
        self.created + self.updated + self.deleted + self.purged
    }

    fn record(&mut self, action: SyncAction) {
        match action {
            SyncAction::Create => self.created += 1,
            SyncAction::Update => self.updated += 1,
            SyncAction::Delete => self.deleted += 1,
            SyncAction::Purge => self.purged += 1,
        }
    }
}

/// Outcome of a one-shot `run_once`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub reconcile: ReconcileReport,
    pub push: PushReport,
}

/// Tracks which change-feed values the engine has already accounted for.
///
/// Writes made by the engine itself advance the feed too; those are absorbed
/// so they do not supersede the snapshot being pushed.
struct ChangeCursor {
    changes: watch::Receiver<u64>,
    seen: u64,
    external_pending: bool,
}

impl ChangeCursor {
    fn new(mut changes: watch::Receiver<u64>) -> Self {
        let seen = *changes.borrow_and_update();
        Self {
            changes,
            seen,
            external_pending: false,
        }
    }

    /// Start a fresh snapshot
    fn mark_seen(&mut self) {
        self.seen = *self.changes.borrow_and_update();
        self.external_pending = false;
    }

    fn superseded(&self) -> bool {
        self.external_pending || self.changes.has_changed().unwrap_or(false)
    }

    /// Account for one engine write that notified the feed.
    fn absorb_own_write(&mut self, wrote: bool) {
        if !wrote {
            return;
        }
        let current = *self.changes.borrow_and_update();
        if current != self.seen.wrapping_add(1) {
            self.external_pending = true;
        }
        self.seen = current;
    }

    /// Wait for the next external change. `false` once the feed is closed.
    async fn changed(&mut self) -> bool {
        if self.superseded() {
            return true;
        }
        self.changes.changed().await.is_ok()
    }
}

struct Session {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

struct Inner {
    local: Arc<dyn LocalJournalStore>,
    remote: Arc<dyn RemoteJournalStore>,
    identity: Arc<dyn IdentityProvider>,
    state: watch::Sender<SyncState>,
    session: Mutex<Option<Session>>,
}

/// Sync engine service. Cloning shares the same engine.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
}

impl SyncEngine {
    pub fn new(
        local: Arc<dyn LocalJournalStore>,
        remote: Arc<dyn RemoteJournalStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let (state, _) = watch::channel(SyncState::Offline);
        Self {
            inner: Arc::new(Inner {
                local,
                remote,
                identity,
                state,
                session: Mutex::new(None),
            }),
        }
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a background sync session and return immediately.
    ///
    /// Returns `false` without doing anything when a session is already
    /// running, nobody is signed in, or no tokio runtime is available.
    pub fn start(&self) -> bool {
        let mut session = self.session();
        if session.as_ref().is_some_and(|running| !running.task.is_finished()) {
            tracing::debug!("Sync session already running");
            return false;
        }

        let Some(user_id) = self.inner.identity.current_user_id() else {
            tracing::warn!("Sync not started: no user is signed in");
            return false;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("Sync not started: no tokio runtime available");
            return false;
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let engine = self.clone();
        let task = runtime.spawn(async move {
            engine.run_session(user_id, shutdown_rx).await;
        });
        *session = Some(Session { shutdown, task });
        true
    }

    /// Signal the running session to end and wait for it.
    pub async fn stop(&self) {
        let session = self.session().take();
        let Some(session) = session else {
            return;
        };
        let _ = session.shutdown.send(true);
        if let Err(error) = session.task.await {
            tracing::warn!("Sync session ended abnormally: {}", error);
        }
        self.set_state(SyncState::Offline);
    }

    pub fn is_running(&self) -> bool {
        self.session()
            .as_ref()
            .is_some_and(|session| !session.task.is_finished())
    }

    /// Live sync state
    pub fn state(&self) -> watch::Receiver<SyncState> {
        self.inner.state.subscribe()
    }

    fn set_state(&self, state: SyncState) {
        self.inner.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    /// Reconcile once, then push once, for the signed-in user.
    pub async fn run_once(&self) -> Result<SyncReport> {
        let user_id = self
            .inner
            .identity
            .current_user_id()
            .ok_or(Error::NotSignedIn)?;

        self.set_state(SyncState::Syncing);
        let result = self.sync_user(&user_id).await;
        self.set_state(match &result {
            Ok(report) if report.push.failed == 0 => SyncState::Synced,
            _ => SyncState::Error,
        });
        result
    }

    async fn sync_user(&self, user_id: &str) -> Result<SyncReport> {
        let reconcile = self.reconcile(user_id).await?;
        let push = self.push_pending(user_id).await?;
        Ok(SyncReport { reconcile, push })
    }

    /// Bring every remote document of `user_id` into the local store.
    pub async fn reconcile(&self, user_id: &str) -> Result<ReconcileReport> {
        let local = &self.inner.local;
        let rows = local.list_with_tombstones(user_id).await?;
        let listing = self.inner.remote.list(user_id).await?;
        let documents = &listing.journals;

        let by_remote_id = rows
            .iter()
            .filter(|row| row.is_synced_remotely())
            .map(|row| (row.remote_id.trim(), row))
            .collect::<HashMap<_, _>>();

        let mut report = ReconcileReport {
            skipped_unreadable: listing.skipped(),
            ..ReconcileReport::default()
        };
        for document in documents {
            match by_remote_id.get(document.remote_id.as_str()) {
                None => {
                    local.insert_synced(document).await?;
                    report.inserted += 1;
                }
                Some(row) if row.is_deleted => report.skipped_tombstoned += 1,
                Some(row) if row.needs_update => report.skipped_dirty += 1,
                Some(row) if row.fields == document.fields => report.unchanged += 1,
                Some(row) => {
                    if local.apply_remote(row.id, &document.fields).await? {
                        report.updated += 1;
                    } else {
                        // Edited or deleted since the rows were read
                        report.skipped_dirty += 1;
                    }
                }
            }
        }

        if listing.unidentified > 0 {
            tracing::warn!(
                "Keeping local journals of {}: {} remote documents could not be identified",
                user_id,
                listing.unidentified
            );
        } else {
            let remote_ids = documents
                .iter()
                .map(|document| document.remote_id.as_str())
                .chain(listing.skipped_ids.iter().map(String::as_str))
                .collect::<HashSet<_>>();
            for row in &rows {
                let vanished = row.is_synced_remotely()
                    && !row.is_deleted
                    && !row.needs_update
                    && !remote_ids.contains(row.remote_id.trim());
                if vanished && local.remove_synced(row.id).await? {
                    tracing::debug!("Removed entry {} deleted on another device", row.id);
                    report.removed += 1;
                }
            }
        }

        tracing::info!(
            "Reconciled {} remote journals for {}: {} inserted, {} updated, {} removed",
            documents.len(),
            user_id,
            report.inserted,
            report.updated,
            report.removed
        );
        Ok(report)
    }

    /// Push the current candidate view of `user_id` once.
    pub async fn push_pending(&self, user_id: &str) -> Result<PushReport> {
        let mut cursor = ChangeCursor::new(self.inner.local.subscribe());
        self.drain(user_id, &mut cursor, None).await
    }

    /// Push snapshots until one completes without being superseded.
    async fn drain(
        &self,
        user_id: &str,
        cursor: &mut ChangeCursor,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<PushReport> {
        let stopping = || shutdown.is_some_and(|shutdown| *shutdown.borrow());
        let mut report = PushReport::default();

        'snapshot: loop {
            cursor.mark_seen();
            let candidates = self.inner.local.sync_candidates(user_id).await?;
            if !candidates.is_empty() {
                tracing::debug!("Pushing {} pending journal entries", candidates.len());
            }

            for entry in &candidates {
                if stopping() {
                    return Ok(report);
                }
                if cursor.superseded() {
                    tracing::debug!("Local journal changed, restarting push");
                    report.superseded += 1;
                    continue 'snapshot;
                }

                let Some(action) = entry.sync_action() else {
                    continue;
                };
                match self.push_entry(user_id, entry, action, cursor).await {
                    Ok(()) => report.record(action),
                    Err(error) => {
                        tracing::warn!("Failed to {} entry {}: {}", action, entry.id, error);
                        report.failed += 1;
                    }
                }
            }

            if cursor.superseded() && !stopping() {
                continue 'snapshot;
            }
            return Ok(report);
        }
    }

    /// Apply one entry's pending action; on error the row is left untouched.
    async fn push_entry(
        &self,
        user_id: &str,
        entry: &JournalEntry,
        action: SyncAction,
        cursor: &mut ChangeCursor,
    ) -> Result<()> {
        let local = &self.inner.local;
        let remote = &self.inner.remote;

        match action {
            SyncAction::Create => {
                let remote_id = remote.create(user_id, &entry.fields).await?;
                cursor.absorb_own_write(local.set_remote_id(entry.id, &remote_id).await?);
                if entry.needs_update {
                    cursor.absorb_own_write(
                        local.clear_needs_update(entry.id, entry.revision).await?,
                    );
                }
                tracing::debug!("Created remote journal {remote_id} for entry {}", entry.id);
            }
            SyncAction::Update => {
                remote
                    .update(user_id, &entry.remote_id, &entry.fields)
                    .await?;
                cursor.absorb_own_write(local.clear_needs_update(entry.id, entry.revision).await?);
                tracing::debug!("Updated remote journal {}", entry.remote_id);
            }
            SyncAction::Delete => {
                remote.delete(user_id, &entry.remote_id).await?;
                cursor.absorb_own_write(local.purge(entry.id).await?);
                tracing::debug!("Deleted remote journal {}", entry.remote_id);
            }
            SyncAction::Purge => {
                cursor.absorb_own_write(local.purge(entry.id).await?);
                tracing::debug!("Purged never-synced entry {}", entry.id);
            }
        }
        Ok(())
    }

    async fn run_session(&self, user_id: String, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Sync session started for {user_id}");
        self.set_state(SyncState::Syncing);

        if let Err(error) = self.reconcile(&user_id).await {
            tracing::warn!("Reconciliation failed: {}", error);
        }

        let mut cursor = ChangeCursor::new(self.inner.local.subscribe());
        loop {
            if *shutdown.borrow() {
                break;
            }

            self.set_state(SyncState::Syncing);
            let state = match self.drain(&user_id, &mut cursor, Some(&shutdown)).await {
                Ok(report) if report.failed == 0 => SyncState::Synced,
                Ok(_) => SyncState::Error,
                Err(error) => {
                    tracing::warn!("Failed to read pending journal entries: {}", error);
                    SyncState::Error
                }
            };
            self.set_state(state);

            tokio::select! {
                _ = shutdown.changed() => break,
                open = cursor.changed() => {
                    if !open {
                        break;
                    }
                }
            }
        }

        self.set_state(SyncState::Offline);
        tracing::info!("Sync session stopped for {user_id}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_absorbs_own_writes_only() {
        let (sender, receiver) = watch::channel(0_u64);
        let mut cursor = ChangeCursor::new(receiver);
        assert!(!cursor.superseded());

        // Engine write
        sender.send_modify(|value| *value += 1);
        cursor.absorb_own_write(true);
        assert!(!cursor.superseded());

        // Author write racing with an engine write
        sender.send_modify(|value| *value += 1);
        sender.send_modify(|value| *value += 1);
        cursor.absorb_own_write(true);
        assert!(cursor.superseded());

        cursor.mark_seen();
        assert!(!cursor.superseded());

        // Author write while the engine's write was a no-op
        sender.send_modify(|value| *value += 1);
        cursor.absorb_own_write(false);
        assert!(cursor.superseded());
    }

    #[test]
    fn push_report_counts_actions() {
        let mut report = PushReport::default();
        report.record(SyncAction::Create);
        report.record(SyncAction::Purge);
        report.record(SyncAction::Delete);
        assert_eq!(report.pushed(), 3);
        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 0);
    }
}
