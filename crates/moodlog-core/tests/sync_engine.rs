use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use moodlog_core::store::RemoteResult;
use moodlog_core::{
    EntryFields, EntryId, Error, JournalService, LocalJournalStore, Location, MemoryRemoteStore,
    Mood, RemoteJournalStore, RemoteListing, SessionIdentity, SyncEngine, SyncState,
};
use pretty_assertions::assert_eq;

const USER: &str = "user-1";

struct Harness {
    local: Arc<JournalService>,
    remote: Arc<MemoryRemoteStore>,
    engine: SyncEngine,
}

fn harness() -> Harness {
    harness_with(Arc::new(MemoryRemoteStore::new()))
}

fn harness_with(remote: Arc<MemoryRemoteStore>) -> Harness {
    let local = Arc::new(JournalService::open_in_memory().unwrap());
    let engine = SyncEngine::new(
        local.clone(),
        remote.clone(),
        Arc::new(SessionIdentity::signed_in(USER)),
    );
    Harness {
        local,
        remote,
        engine,
    }
}

fn fields(content: &str, date: &str) -> EntryFields {
    EntryFields::new(content, Mood::Satisfied).with_date(date)
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread")]
async fn never_pushed_entry_gets_remote_id() {
    let h = harness();
    let entry = h.local.insert(USER, &fields("A", "1000")).await.unwrap();
    assert_eq!(entry.remote_id, "");

    let report = h.engine.push_pending(USER).await.unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.failed, 0);

    let synced = h.local.get(entry.id).await.unwrap().unwrap();
    assert!(synced.remote_id.starts_with("mem-"));
    assert!(!synced.needs_update);
    assert!(h.local.sync_candidates(USER).await.unwrap().is_empty());

    let document = h.remote.document(USER, &synced.remote_id).unwrap();
    assert_eq!(document.fields.content, "A");
}

#[tokio::test(flavor = "multi_thread")]
async fn dirty_entry_is_pushed_and_cleared() {
    let h = harness();
    let remote_id = h.remote.seed(USER, fields("A", "1000"));
    let entry = h
        .local
        .insert_synced(&h.remote.document(USER, &remote_id).unwrap())
        .await
        .unwrap();

    let mut edited = entry.fields.clone();
    edited.content = "B".to_string();
    let entry = h.local.update_fields(entry.id, &edited).await.unwrap();
    assert!(entry.needs_update);

    let report = h.engine.push_pending(USER).await.unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(h.remote.calls().creates, 0);

    let synced = h.local.get(entry.id).await.unwrap().unwrap();
    assert!(!synced.needs_update);
    assert_eq!(synced.remote_id, remote_id);
    assert_eq!(h.remote.document(USER, &remote_id).unwrap().fields.content, "B");
}

#[tokio::test(flavor = "multi_thread")]
async fn synced_tombstone_vanishes_from_both_stores() {
    let h = harness();
    let entry = h.local.insert(USER, &fields("A", "1000")).await.unwrap();
    h.engine.push_pending(USER).await.unwrap();
    let remote_id = h.local.get(entry.id).await.unwrap().unwrap().remote_id;

    h.local.mark_deleted(entry.id).await.unwrap();
    let report = h.engine.push_pending(USER).await.unwrap();
    assert_eq!(report.deleted, 1);

    assert!(h.local.get(entry.id).await.unwrap().is_none());
    assert!(h.remote.document(USER, &remote_id).is_none());
    assert_eq!(h.remote.calls().deletes, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn never_synced_tombstone_is_purged_without_remote_call() {
    let h = harness();
    let entry = h.local.insert(USER, &fields("draft", "1000")).await.unwrap();
    h.local.mark_deleted(entry.id).await.unwrap();

    let report = h.engine.push_pending(USER).await.unwrap();
    assert_eq!(report.purged, 1);
    assert!(h.local.get(entry.id).await.unwrap().is_none());
    assert_eq!(h.remote.calls().writes(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn push_ignores_other_users() {
    let h = harness();
    h.local.insert("user-2", &fields("theirs", "1000")).await.unwrap();

    let report = h.engine.push_pending(USER).await.unwrap();
    assert_eq!(report.pushed(), 0);
    assert_eq!(h.remote.calls().creates, 0);
    assert_eq!(h.local.sync_candidates("user-2").await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn reconcile_twice_performs_no_writes() {
    let h = harness();
    h.remote.seed(USER, fields("first", "1000"));
    h.remote.seed(USER, fields("second", "2000"));

    let first = h.engine.reconcile(USER).await.unwrap();
    assert_eq!(first.inserted, 2);

    let revision = h.local.revision();
    let second = h.engine.reconcile(USER).await.unwrap();
    assert_eq!(second.writes(), 0);
    assert_eq!(second.unchanged, 2);
    assert_eq!(h.local.revision(), revision);
    assert_eq!(h.remote.calls().writes(), 0);

    let local = h.local.list_for_user(USER).await.unwrap();
    assert_eq!(local.len(), 2);
    assert!(local.iter().all(|entry| !entry.needs_update));
    assert!(h.local.sync_candidates(USER).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn reconcile_overwrites_clean_rows_with_remote_values() {
    let h = harness();
    let remote_id = h.remote.seed(USER, fields("original", "1000"));
    h.engine.reconcile(USER).await.unwrap();

    let mut changed = fields("changed elsewhere", "1000");
    changed.mood = Mood::VeryDissatisfied;
    h.remote.update(USER, &remote_id, &changed).await.unwrap();

    let report = h.engine.reconcile(USER).await.unwrap();
    assert_eq!(report.updated, 1);

    let local = h.local.list_for_user(USER).await.unwrap();
    assert_eq!(local[0].fields, changed);
    assert!(!local[0].needs_update);
}

#[tokio::test(flavor = "multi_thread")]
async fn reconcile_never_resurrects_tombstones() {
    let h = harness();
    let remote_id = h.remote.seed(USER, fields("original", "1000"));
    h.engine.reconcile(USER).await.unwrap();
    let entry = h.local.list_for_user(USER).await.unwrap().remove(0);
    h.local.mark_deleted(entry.id).await.unwrap();

    h.remote
        .update(USER, &remote_id, &fields("edited elsewhere", "1000"))
        .await
        .unwrap();

    let report = h.engine.reconcile(USER).await.unwrap();
    assert_eq!(report.skipped_tombstoned, 1);
    assert_eq!(report.inserted, 0);
    assert!(h.local.list_for_user(USER).await.unwrap().is_empty());

    let rows = h.local.list_with_tombstones(USER).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_deleted);
    assert_eq!(rows[0].fields.content, "original");
}

#[tokio::test(flavor = "multi_thread")]
async fn reconcile_keeps_unpushed_local_edits() {
    let h = harness();
    let remote_id = h.remote.seed(USER, fields("original", "1000"));
    h.engine.reconcile(USER).await.unwrap();
    let entry = h.local.list_for_user(USER).await.unwrap().remove(0);
    h.local
        .update_fields(entry.id, &fields("local edit", "1000"))
        .await
        .unwrap();

    h.remote
        .update(USER, &remote_id, &fields("remote edit", "1000"))
        .await
        .unwrap();

    let report = h.engine.reconcile(USER).await.unwrap();
    assert_eq!(report.skipped_dirty, 1);
    let local = h.local.get(entry.id).await.unwrap().unwrap();
    assert_eq!(local.fields.content, "local edit");
    assert!(local.needs_update);
}

#[tokio::test(flavor = "multi_thread")]
async fn reconcile_leaves_never_pushed_rows_alone() {
    let h = harness();
    let draft = h.local.insert(USER, &fields("draft", "1000")).await.unwrap();
    h.remote.seed(USER, fields("remote", "2000"));

    let report = h.engine.reconcile(USER).await.unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(report.removed, 0);
    assert_eq!(h.local.get(draft.id).await.unwrap().unwrap(), draft);
}

#[tokio::test(flavor = "multi_thread")]
async fn reconcile_removes_entries_deleted_on_another_device() {
    let h = harness();
    let remote_id = h.remote.seed(USER, fields("gone soon", "1000"));
    h.remote.seed(USER, fields("stays", "2000"));
    h.engine.reconcile(USER).await.unwrap();
    assert!(h.remote.remove(USER, &remote_id));

    let report = h.engine.reconcile(USER).await.unwrap();
    assert_eq!(report.removed, 1);

    let contents = h
        .local
        .list_for_user(USER)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.fields.content)
        .collect::<Vec<_>>();
    assert_eq!(contents, vec!["stays"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn second_device_round_trip_reproduces_fields() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let first = harness_with(remote.clone());

    let with_location = fields("Sunny walk", "1700000000000")
        .with_location(Location::from_parts(54.57, -1.23, "Middlesbrough").unwrap())
        .with_image("aGVsbG8=");
    let mut plain = fields("Quiet evening", "1700000500000");
    plain.mood = Mood::Dissatisfied;
    first.local.insert(USER, &with_location).await.unwrap();
    first.local.insert(USER, &plain).await.unwrap();
    assert_eq!(first.engine.push_pending(USER).await.unwrap().created, 2);

    let second = harness_with(remote);
    let report = second.engine.reconcile(USER).await.unwrap();
    assert_eq!(report.inserted, 2);

    let mut original = first.local.list_for_user(USER).await.unwrap();
    let mut copied = second.local.list_for_user(USER).await.unwrap();
    original.sort_by(|a, b| a.remote_id.cmp(&b.remote_id));
    copied.sort_by(|a, b| a.remote_id.cmp(&b.remote_id));
    assert_eq!(copied.len(), original.len());
    for (copy, source) in copied.iter().zip(&original) {
        assert_eq!(copy.remote_id, source.remote_id);
        assert_eq!(copy.user_id, source.user_id);
        assert_eq!(copy.fields, source.fields);
        assert!(!copy.needs_update);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_push_leaves_row_for_retry() {
    let h = harness();
    let entry = h.local.insert(USER, &fields("A", "1000")).await.unwrap();
    h.remote.set_offline(true);

    let report = h.engine.push_pending(USER).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(h.local.get(entry.id).await.unwrap().unwrap(), entry);

    h.remote.set_offline(false);
    let report = h.engine.push_pending(USER).await.unwrap();
    assert_eq!(report.created, 1);
    assert!(h.local.sync_candidates(USER).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn run_once_requires_signed_in_user() {
    let local = Arc::new(JournalService::open_in_memory().unwrap());
    let remote = Arc::new(MemoryRemoteStore::new());
    let engine = SyncEngine::new(local, remote.clone(), Arc::new(SessionIdentity::signed_out()));

    assert!(matches!(engine.run_once().await, Err(Error::NotSignedIn)));
    assert_eq!(remote.calls().lists, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn run_once_reconciles_then_pushes() {
    let h = harness();
    h.remote.seed(USER, fields("from the cloud", "1000"));
    h.local.insert(USER, &fields("written here", "2000")).await.unwrap();

    let report = h.engine.run_once().await.unwrap();
    assert_eq!(report.reconcile.inserted, 1);
    assert_eq!(report.push.created, 1);
    assert_eq!(*h.engine.state().borrow(), SyncState::Synced);
    assert_eq!(h.remote.documents(USER).len(), 2);
    assert_eq!(h.local.list_for_user(USER).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn start_while_signed_out_does_nothing() {
    let local = Arc::new(JournalService::open_in_memory().unwrap());
    let remote = Arc::new(MemoryRemoteStore::new());
    let identity = Arc::new(SessionIdentity::signed_out());
    let engine = SyncEngine::new(local.clone(), remote.clone(), identity.clone());

    local.insert(USER, &fields("A", "1000")).await.unwrap();
    assert!(!engine.start());
    assert!(!engine.is_running());
    assert_eq!(*engine.state().borrow(), SyncState::Offline);
    assert_eq!(remote.calls().writes(), 0);
    assert_eq!(remote.calls().lists, 0);

    // Signing in and starting again syncs
    identity.sign_in(USER);
    assert!(engine.start());
    eventually(|| {
        let local = local.clone();
        async move { local.sync_candidates(USER).await.unwrap().is_empty() }
    })
    .await;
    engine.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn session_pushes_changes_continuously() {
    let h = harness();
    h.remote.seed(USER, fields("already there", "500"));
    assert!(h.engine.start());
    assert!(!h.engine.start());
    assert!(h.engine.is_running());

    eventually(|| {
        let local = h.local.clone();
        async move { local.list_for_user(USER).await.unwrap().len() == 1 }
    })
    .await;

    let entry_id = h.local.insert(USER, &fields("live", "1000")).await.unwrap().id;
    eventually(|| {
        let local = h.local.clone();
        async move {
            local
                .get(entry_id)
                .await
                .unwrap()
                .is_some_and(|entry| !entry.remote_id.is_empty())
        }
    })
    .await;

    let mut edited = fields("live, edited", "1000");
    edited.mood = Mood::VerySatisfied;
    h.local.update_fields(entry_id, &edited).await.unwrap();
    eventually(|| {
        let remote = h.remote.clone();
        async move {
            remote
                .documents(USER)
                .iter()
                .any(|doc| doc.fields.content == "live, edited")
        }
    })
    .await;

    h.local.mark_deleted(entry_id).await.unwrap();
    eventually(|| {
        let remote = h.remote.clone();
        async move { remote.documents(USER).len() == 1 }
    })
    .await;

    let mut state = h.engine.state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|state| *state == SyncState::Synced),
    )
    .await
    .expect("session did not settle")
    .unwrap();

    h.engine.stop().await;
    assert!(!h.engine.is_running());
    assert_eq!(*h.engine.state().borrow(), SyncState::Offline);
    assert_eq!(h.remote.calls().creates, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn session_pushes_entries_written_by_another_process() {
    let tmp = tempfile::tempdir().unwrap();
    let db_path = tmp.path().join("moodlog.db");
    let local = Arc::new(JournalService::open_path(&db_path).unwrap());
    let remote = Arc::new(MemoryRemoteStore::new());
    let engine = SyncEngine::new(
        local.clone(),
        remote.clone(),
        Arc::new(SessionIdentity::signed_in(USER)),
    );
    assert!(engine.start());

    let mut state = engine.state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|state| *state == SyncState::Synced),
    )
    .await
    .expect("session did not settle")
    .unwrap();

    let other_process = JournalService::open_path(&db_path).unwrap();
    other_process
        .insert(USER, &fields("written by moodlog add", "1000"))
        .await
        .unwrap();

    eventually(|| {
        let remote = remote.clone();
        async move { remote.documents(USER).len() == 1 }
    })
    .await;
    eventually(|| {
        let local = local.clone();
        async move { local.sync_candidates(USER).await.unwrap().is_empty() }
    })
    .await;

    engine.stop().await;
    assert_eq!(remote.calls().creates, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn session_retries_failed_entries_on_next_change() {
    let h = harness();
    h.remote.set_offline(true);
    h.local.insert(USER, &fields("offline write", "1000")).await.unwrap();
    assert!(h.engine.start());

    let mut state = h.engine.state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|state| *state == SyncState::Error),
    )
    .await
    .expect("session did not report the failure")
    .unwrap();
    assert_eq!(h.local.sync_candidates(USER).await.unwrap().len(), 1);

    h.remote.set_offline(false);
    h.local.insert(USER, &fields("back online", "2000")).await.unwrap();
    eventually(|| {
        let local = h.local.clone();
        async move { local.sync_candidates(USER).await.unwrap().is_empty() }
    })
    .await;
    assert_eq!(h.remote.documents(USER).len(), 2);

    h.engine.stop().await;
}

/// Local change applied by `ChangeDuringCreate`
enum LocalChange {
    Edit(EntryFields),
    Delete,
}

/// Remote store that applies one local change while a create call is in flight.
struct ChangeDuringCreate {
    inner: MemoryRemoteStore,
    local: Arc<JournalService>,
    change: Mutex<Option<(EntryId, LocalChange)>>,
}

#[async_trait]
impl RemoteJournalStore for ChangeDuringCreate {
    async fn create(&self, user_id: &str, fields: &EntryFields) -> RemoteResult<String> {
        let pending = self.change.lock().unwrap().take();
        match pending {
            Some((id, LocalChange::Edit(edited))) => {
                self.local.update_fields(id, &edited).await.unwrap();
            }
            Some((id, LocalChange::Delete)) => self.local.mark_deleted(id).await.unwrap(),
            None => {}
        }
        self.inner.create(user_id, fields).await
    }

    async fn update(
        &self,
        user_id: &str,
        remote_id: &str,
        fields: &EntryFields,
    ) -> RemoteResult<()> {
        self.inner.update(user_id, remote_id, fields).await
    }

    async fn delete(&self, user_id: &str, remote_id: &str) -> RemoteResult<()> {
        self.inner.delete(user_id, remote_id).await
    }

    async fn list(&self, user_id: &str) -> RemoteResult<RemoteListing> {
        self.inner.list(user_id).await
    }
}

fn changing_engine(
    local: &Arc<JournalService>,
    target: EntryId,
    change: LocalChange,
) -> (Arc<ChangeDuringCreate>, SyncEngine) {
    let remote = Arc::new(ChangeDuringCreate {
        inner: MemoryRemoteStore::new(),
        local: local.clone(),
        change: Mutex::new(Some((target, change))),
    });
    let engine = SyncEngine::new(
        local.clone(),
        remote.clone(),
        Arc::new(SessionIdentity::signed_in(USER)),
    );
    (remote, engine)
}

#[tokio::test(flavor = "multi_thread")]
async fn newer_snapshot_supersedes_current_one() {
    let local = Arc::new(JournalService::open_in_memory().unwrap());
    let first = local.insert(USER, &fields("first", "1000")).await.unwrap();
    let second = local.insert(USER, &fields("second", "2000")).await.unwrap();
    let (remote, engine) = changing_engine(
        &local,
        second.id,
        LocalChange::Edit(fields("second, edited", "2000")),
    );

    let report = engine.push_pending(USER).await.unwrap();
    assert_eq!(report.superseded, 1);
    assert_eq!(report.created, 2);
    assert_eq!(report.failed, 0);

    // The in-flight create was not repeated
    assert_eq!(remote.inner.calls().creates, 2);
    let contents = remote
        .inner
        .documents(USER)
        .into_iter()
        .map(|doc| doc.fields.content)
        .collect::<Vec<_>>();
    assert_eq!(contents, vec!["first", "second, edited"]);

    let second = local.get(second.id).await.unwrap().unwrap();
    assert!(!second.needs_update);
    assert!(local.get(first.id).await.unwrap().unwrap().is_synced_remotely());
}

#[tokio::test(flavor = "multi_thread")]
async fn edit_during_own_create_is_pushed_afterwards() {
    let local = Arc::new(JournalService::open_in_memory().unwrap());
    let entry = local.insert(USER, &fields("draft", "1000")).await.unwrap();
    let (remote, engine) =
        changing_engine(&local, entry.id, LocalChange::Edit(fields("final", "1000")));

    let report = engine.push_pending(USER).await.unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 1);

    let entry = local.get(entry.id).await.unwrap().unwrap();
    assert!(!entry.needs_update);
    assert_eq!(remote.inner.calls().creates, 1);
    assert_eq!(
        remote.inner.document(USER, &entry.remote_id).unwrap().fields.content,
        "final"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_during_own_create_is_deleted_remotely_afterwards() {
    let local = Arc::new(JournalService::open_in_memory().unwrap());
    let entry = local.insert(USER, &fields("regretted", "1000")).await.unwrap();
    let (remote, engine) = changing_engine(&local, entry.id, LocalChange::Delete);

    let report = engine.push_pending(USER).await.unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.failed, 0);

    let calls = remote.inner.calls();
    assert_eq!(calls.creates, 1);
    assert_eq!(calls.deletes, 1);
    assert!(remote.inner.documents(USER).is_empty());
    assert!(local.get(entry.id).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn reconcile_keeps_rows_whose_document_cannot_be_read() {
    let h = harness();
    let unreadable = h.remote.seed(USER, fields("written by a newer client", "1000"));
    let gone = h.remote.seed(USER, fields("deleted elsewhere", "2000"));
    h.engine.reconcile(USER).await.unwrap();
    assert!(h.remote.corrupt(USER, &unreadable));
    assert!(h.remote.remove(USER, &gone));

    let report = h.engine.reconcile(USER).await.unwrap();
    assert_eq!(report.skipped_unreadable, 1);
    assert_eq!(report.removed, 1);

    let rows = h.local.list_for_user(USER).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].remote_id, unreadable);
    assert_eq!(rows[0].fields.content, "written by a newer client");
}
