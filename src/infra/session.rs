//! Change-tracking session.
//!
//! The session is an explicit arena keyed by `(table, id)`. Each entry keeps
//! the committed snapshot it was attached from and the current staged value;
//! `save_changes` diffs the two, stamps metadata, asks the audit interceptor
//! for audit rows and hands one batch to the store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::audit::AuditInterceptor;
use super::store::{CommitBatch, Row, RowWrite, Store, WriteOp};
use crate::domain::{Metadata, IS_DELETED_COLUMN};
use crate::errors::{AppError, AppResult};
use crate::specification::RowSource;

/// Tracking state of a staged entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Unchanged,
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone)]
struct TrackedEntry {
    table: &'static str,
    id: Uuid,
    state: EntityState,
    /// Committed snapshot; `None` until an added entity is committed
    original: Option<Value>,
    current: Value,
    /// Version the store must still hold at commit; `None` for inserts
    expected_version: Option<i64>,
}

/// What a pending change does to its row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    SoftDelete,
    Delete,
}

/// One entity change about to be committed, metadata already stamped.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChange {
    pub table: &'static str,
    pub id: Uuid,
    pub kind: ChangeKind,
    /// Row before the change (`None` for inserts)
    pub original: Option<Value>,
    /// Row after the change (`None` for physical deletes)
    pub current: Option<Value>,
    pub expected_version: Option<i64>,
    /// Version written by this change
    pub version: i64,
}

impl PendingChange {
    fn to_write(&self) -> RowWrite {
        let op = match (self.kind, self.expected_version, &self.current) {
            (ChangeKind::Insert, _, Some(data)) | (_, None, Some(data)) => WriteOp::Insert {
                version: self.version,
                data: data.clone(),
            },
            (ChangeKind::Update | ChangeKind::SoftDelete, Some(expected), Some(data)) => {
                WriteOp::Update {
                    expected_version: expected,
                    version: self.version,
                    data: data.clone(),
                }
            }
            (_, expected, _) => WriteOp::Delete {
                expected_version: expected.unwrap_or_default(),
            },
        };
        RowWrite {
            table: self.table.to_string(),
            id: self.id,
            op,
        }
    }
}

/// Copy of `row` with its metadata block rewritten by `stamp`.
fn stamp(row: &Value, stamp: impl FnOnce(&mut Metadata)) -> AppResult<Value> {
    let mut metadata: Metadata = serde_json::from_value(row.clone())?;
    stamp(&mut metadata);

    let mut stamped = row.clone();
    if let (Value::Object(target), Value::Object(fields)) =
        (&mut stamped, serde_json::to_value(&metadata)?)
    {
        target.extend(fields);
    }
    Ok(stamped)
}

fn is_deleted(row: Option<&Value>) -> bool {
    row.and_then(|r| r.get(IS_DELETED_COLUMN))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

#[derive(Debug, Default)]
struct ChangeTracker {
    /// Staging order is commit order
    entries: Vec<TrackedEntry>,
}

impl ChangeTracker {
    fn position(&self, table: &str, id: Uuid) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.table == table && e.id == id)
    }

    fn get(&self, table: &str, id: Uuid) -> Option<&TrackedEntry> {
        self.position(table, id).map(|i| &self.entries[i])
    }

    fn overlay(&self, table: &str, rows: &mut BTreeMap<Uuid, Value>, only: Option<&[Uuid]>) {
        let wanted = |id: &Uuid| only.map_or(true, |ids| ids.contains(id));
        for entry in self.entries.iter().filter(|e| e.table == table && wanted(&e.id)) {
            if entry.state == EntityState::Deleted {
                rows.remove(&entry.id);
            } else {
                rows.insert(entry.id, entry.current.clone());
            }
        }
    }

    fn has_changes(&self) -> bool {
        self.entries.iter().any(|e| match e.state {
            EntityState::Unchanged => false,
            EntityState::Modified => e.original.as_ref() != Some(&e.current),
            EntityState::Added | EntityState::Deleted => true,
        })
    }

    fn pending_changes(&self, user: &str, now: DateTime<Utc>) -> AppResult<Vec<PendingChange>> {
        let mut changes = Vec::new();
        for entry in &self.entries {
            let change = match entry.state {
                EntityState::Unchanged => continue,
                EntityState::Added => PendingChange {
                    table: entry.table,
                    id: entry.id,
                    kind: ChangeKind::Insert,
                    original: None,
                    current: Some(stamp(&entry.current, |m| {
                        m.created_by = Some(user.to_string());
                        m.created_on = Some(now);
                        m.version = 1;
                    })?),
                    expected_version: None,
                    version: 1,
                },
                EntityState::Modified => {
                    if entry.original.as_ref() == Some(&entry.current) {
                        continue;
                    }
                    let expected = entry.expected_version.unwrap_or_default();
                    let kind = if !is_deleted(entry.original.as_ref())
                        && is_deleted(Some(&entry.current))
                    {
                        ChangeKind::SoftDelete
                    } else {
                        ChangeKind::Update
                    };
                    PendingChange {
                        table: entry.table,
                        id: entry.id,
                        kind,
                        original: entry.original.clone(),
                        current: Some(stamp(&entry.current, |m| {
                            m.last_modified_by = Some(user.to_string());
                            m.last_modified_on = Some(now);
                            m.version = expected + 1;
                        })?),
                        expected_version: Some(expected),
                        version: expected + 1,
                    }
                }
                EntityState::Deleted => PendingChange {
                    table: entry.table,
                    id: entry.id,
                    kind: ChangeKind::Delete,
                    original: entry.original.clone(),
                    current: None,
                    expected_version: entry.expected_version,
                    version: entry.expected_version.unwrap_or_default(),
                },
            };
            changes.push(change);
        }
        Ok(changes)
    }

    /// Make committed changes the new baseline.
    fn accept(&mut self, changes: &[PendingChange]) {
        for change in changes {
            let Some(index) = self.position(change.table, change.id) else {
                continue;
            };
            match &change.current {
                None => {
                    self.entries.remove(index);
                }
                Some(committed) => {
                    let entry = &mut self.entries[index];
                    entry.state = EntityState::Unchanged;
                    entry.original = Some(committed.clone());
                    entry.current = committed.clone();
                    entry.expected_version = Some(change.version);
                }
            }
        }
        for entry in &mut self.entries {
            if entry.state == EntityState::Modified && entry.original.as_ref() == Some(&entry.current)
            {
                entry.state = EntityState::Unchanged;
            }
        }
    }
}

/// Single change-tracking session shared by all repositories of one unit of work.
///
/// Not meant for concurrent use; the mutex only lets several repositories
/// share it and is never held across an await.
pub struct Session {
    store: Arc<dyn Store>,
    user_id: String,
    interceptor: AuditInterceptor,
    tracker: Mutex<ChangeTracker>,
    read_only: bool,
}

impl Session {
    pub fn new(store: Arc<dyn Store>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            interceptor: AuditInterceptor::default(),
            tracker: Mutex::new(ChangeTracker::default()),
            read_only: false,
        }
    }

    /// Session that rejects every staging call with `Validation`.
    ///
    /// Used where no caller can reach `save_changes`, so a write could only
    /// be lost.
    pub fn read_only(store: Arc<dyn Store>, user_id: impl Into<String>) -> Self {
        Self {
            read_only: true,
            ..Self::new(store, user_id)
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn ensure_writable(&self) -> AppResult<()> {
        if self.read_only {
            return Err(AppError::validation(
                "read-only session; stage writes through a unit of work",
            ));
        }
        Ok(())
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn tracker(&self) -> MutexGuard<'_, ChangeTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Committed row straight from the store, ignoring staged changes.
    pub async fn committed_row(&self, table: &str, id: Uuid) -> AppResult<Option<Row>> {
        self.store.find(table, id).await
    }

    /// Row as this session sees it: staged value first, then committed.
    pub async fn visible_row(&self, table: &'static str, id: Uuid) -> AppResult<Option<Value>> {
        if let Some(entry) = self.tracker().get(table, id) {
            return Ok(match entry.state {
                EntityState::Deleted => None,
                _ => Some(entry.current.clone()),
            });
        }
        Ok(self.store.find(table, id).await?.map(|row| row.data))
    }

    pub fn state_of(&self, table: &str, id: Uuid) -> Option<EntityState> {
        self.tracker().get(table, id).map(|e| e.state)
    }

    pub fn has_changes(&self) -> bool {
        self.tracker().has_changes()
    }

    // -------------------------------------------------------------------------
    // Staging
    // -------------------------------------------------------------------------

    pub fn stage_added(&self, table: &'static str, id: Uuid, current: Value) -> AppResult<()> {
        self.ensure_writable()?;
        let mut tracker = self.tracker();
        if tracker.get(table, id).is_some() {
            return Err(AppError::validation(format!(
                "{table} {id} is already tracked by this unit of work"
            )));
        }
        tracker.entries.push(TrackedEntry {
            table,
            id,
            state: EntityState::Added,
            original: None,
            current,
            expected_version: None,
        });
        tracing::debug!(table, %id, "Staged insert");
        Ok(())
    }

    /// Replace the staged value of a tracked entity. `Added` stays `Added`.
    pub fn restage(
        &self,
        table: &str,
        id: Uuid,
        current: Value,
        state: EntityState,
    ) -> AppResult<()> {
        self.ensure_writable()?;
        let mut tracker = self.tracker();
        let index = tracker.position(table, id).ok_or(AppError::NotFound)?;
        let entry = &mut tracker.entries[index];
        if entry.state == EntityState::Deleted {
            return Err(AppError::NotFound);
        }
        if entry.state != EntityState::Added {
            entry.state = state;
        }
        entry.current = current;
        tracing::debug!(table, %id, state = ?entry.state, "Restaged");
        Ok(())
    }

    /// Start tracking an entity that exists in the store.
    pub fn attach(
        &self,
        table: &'static str,
        id: Uuid,
        original: Value,
        current: Value,
        state: EntityState,
        expected_version: i64,
    ) -> AppResult<()> {
        self.ensure_writable()?;
        let mut tracker = self.tracker();
        if let Some(index) = tracker.position(table, id) {
            tracker.entries.remove(index);
        }
        tracker.entries.push(TrackedEntry {
            table,
            id,
            state,
            original: Some(original),
            current,
            expected_version: Some(expected_version),
        });
        tracing::debug!(table, %id, ?state, expected_version, "Attached");
        Ok(())
    }

    /// Stop tracking an entity (used to unstage an uncommitted insert).
    pub fn detach(&self, table: &str, id: Uuid) {
        let mut tracker = self.tracker();
        if let Some(index) = tracker.position(table, id) {
            tracker.entries.remove(index);
            tracing::debug!(table, %id, "Detached");
        }
    }

    /// Drop every staged change.
    pub fn discard_changes(&self) {
        self.tracker().entries.clear();
    }

    // -------------------------------------------------------------------------
    // Commit
    // -------------------------------------------------------------------------

    /// Make every staged change durable in one atomic store commit.
    ///
    /// Returns the number of entity rows written. On any error nothing is
    /// written and staged changes stay in the session.
    pub async fn save_changes(&self, cancel: &CancellationToken) -> AppResult<usize> {
        if cancel.is_cancelled() {
            tracing::info!("Save cancelled before commit");
            return Err(AppError::Cancelled);
        }

        let now = Utc::now();
        let changes = self.tracker().pending_changes(&self.user_id, now)?;
        if changes.is_empty() {
            tracing::debug!("No pending changes");
            self.tracker().accept(&changes);
            return Ok(0);
        }

        let audit_logs = self
            .interceptor
            .on_saving(&changes, &self.user_id)
            .iter()
            .map(|entry| entry.to_audit_log(now))
            .collect::<AppResult<Vec<_>>>()?;

        let batch = CommitBatch {
            writes: changes.iter().map(PendingChange::to_write).collect(),
            audit_logs,
        };
        let audit_rows = batch.audit_logs.len();

        if cancel.is_cancelled() {
            tracing::info!("Save cancelled before commit");
            return Err(AppError::Cancelled);
        }

        let written = match self.store.commit(batch).await {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!(error = %e, changes = changes.len(), "Commit failed, nothing was written");
                return Err(e);
            }
        };

        self.tracker().accept(&changes);
        tracing::info!(written, audit_rows, user = %self.user_id, "Changes saved");
        Ok(usize::try_from(written).unwrap_or(usize::MAX))
    }
}

#[async_trait]
impl RowSource for Session {
    async fn rows(&self, table: &'static str) -> AppResult<Vec<Value>> {
        let committed = self.store.scan(table).await?;
        let mut rows: BTreeMap<Uuid, Value> =
            committed.into_iter().map(|row| (row.id, row.data)).collect();
        self.tracker().overlay(table, &mut rows, None);
        Ok(rows.into_values().collect())
    }

    async fn rows_by_id(&self, table: &'static str, ids: &[Uuid]) -> AppResult<Vec<Value>> {
        let committed = self.store.find_many(table, ids).await?;
        let mut rows: BTreeMap<Uuid, Value> =
            committed.into_iter().map(|row| (row.id, row.data)).collect();
        self.tracker().overlay(table, &mut rows, Some(ids));
        Ok(rows.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::store::{MemoryStore, MockStore};
    use serde_json::json;

    fn row(name: &str, version: i64) -> Value {
        json!({
            "id": Uuid::nil(),
            "name": name,
            "active": true,
            "created_by": null,
            "created_on": null,
            "last_modified_by": null,
            "last_modified_on": null,
            "version": version,
        })
    }

    #[test]
    fn stamping_rewrites_only_metadata() {
        let stamped = stamp(&row("a", 3), |m| m.version = 4).unwrap();
        assert_eq!(stamped["version"], 4);
        assert_eq!(stamped["name"], "a");
    }

    #[test]
    fn unchanged_modification_is_not_a_change() {
        let mut tracker = ChangeTracker::default();
        tracker.entries.push(TrackedEntry {
            table: "T",
            id: Uuid::nil(),
            state: EntityState::Modified,
            original: Some(row("a", 1)),
            current: row("a", 1),
            expected_version: Some(1),
        });
        assert!(!tracker.has_changes());
        assert!(tracker.pending_changes("u", Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn soft_delete_flip_is_classified() {
        let mut deleted = row("a", 1);
        deleted["is_deleted"] = json!(true);
        let mut original = row("a", 1);
        original["is_deleted"] = json!(false);
        let mut tracker = ChangeTracker::default();
        tracker.entries.push(TrackedEntry {
            table: "T",
            id: Uuid::nil(),
            state: EntityState::Modified,
            original: Some(original),
            current: deleted,
            expected_version: Some(1),
        });
        let changes = tracker.pending_changes("u", Utc::now()).unwrap();
        assert_eq!(changes[0].kind, ChangeKind::SoftDelete);
        assert_eq!(changes[0].version, 2);
        assert!(matches!(changes[0].to_write().op, WriteOp::Update { expected_version: 1, version: 2, .. }));
    }

    #[tokio::test]
    async fn cancelled_token_never_reaches_the_store() {
        let mut store = MockStore::new();
        store.expect_commit().never();
        let session = Session::new(Arc::new(store), "u");
        session.stage_added("T", Uuid::now_v7(), row("a", 0)).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(session.save_changes(&cancel).await, Err(AppError::Cancelled)));
        assert!(session.has_changes());
    }

    #[tokio::test]
    async fn storage_failure_keeps_staged_changes() {
        let mut store = MockStore::new();
        store
            .expect_commit()
            .times(1)
            .returning(|_| Err(AppError::storage("connection reset")));
        let session = Session::new(Arc::new(store), "u");
        session.stage_added("T", Uuid::now_v7(), row("a", 0)).unwrap();

        let result = session.save_changes(&CancellationToken::new()).await;
        assert!(matches!(result, Err(AppError::Storage(_))));
        assert!(session.has_changes());
    }

    #[tokio::test]
    async fn commit_batch_carries_audit_rows() {
        let mut store = MockStore::new();
        store
            .expect_commit()
            .withf(|batch| batch.writes.len() == 1 && batch.audit_logs.len() == 1)
            .times(1)
            .returning(|batch| Ok(batch.writes.len() as u64));
        let session = Session::new(Arc::new(store), "u");
        session.stage_added("T", Uuid::now_v7(), row("a", 0)).unwrap();

        assert_eq!(session.save_changes(&CancellationToken::new()).await.unwrap(), 1);
        assert!(!session.has_changes());
    }

    #[tokio::test]
    async fn session_sees_its_own_staged_rows() {
        let session = Session::new(Arc::new(MemoryStore::new()), "u");
        let id = Uuid::now_v7();
        session.stage_added("T", id, row("staged", 0)).unwrap();
        assert_eq!(session.rows("T").await.unwrap().len(), 1);
        assert!(session.visible_row("T", id).await.unwrap().is_some());
        assert!(session.committed_row("T", id).await.unwrap().is_none());
    }

    #[test]
    fn read_only_session_rejects_staging() {
        let session = Session::read_only(Arc::new(MemoryStore::new()), "u");
        let id = Uuid::now_v7();
        assert!(session.is_read_only());
        assert!(!Session::new(Arc::new(MemoryStore::new()), "u").is_read_only());

        assert!(matches!(session.stage_added("T", id, row("a", 0)), Err(AppError::Validation(_))));
        assert!(matches!(
            session.attach("T", id, row("a", 1), row("b", 1), EntityState::Modified, 1),
            Err(AppError::Validation(_))
        ));
        assert!(!session.has_changes());
    }
}
