//! In-process store with the same atomicity guarantees as the SQL store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CommitBatch, Row, RowWrite, Store, WriteOp};
use crate::domain::{AuditLog, AuditQuery};
use crate::errors::{AppError, AppResult};

#[derive(Default)]
struct State {
    tables: HashMap<String, BTreeMap<Uuid, Row>>,
    audit_logs: Vec<AuditLog>,
}

/// Store holding committed rows in memory.
///
/// A commit validates every write against the current state before applying
/// any of them, under a single write lock.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn validate(state: &State, write: &RowWrite) -> AppResult<()> {
    let current = state
        .tables
        .get(&write.table)
        .and_then(|rows| rows.get(&write.id));

    match (&write.op, current) {
        (WriteOp::Insert { .. }, Some(_)) => Err(AppError::storage(format!(
            "duplicate key {} in {}",
            write.id, write.table
        ))),
        (WriteOp::Insert { .. }, None) => Ok(()),
        (
            WriteOp::Update {
                expected_version, ..
            }
            | WriteOp::Delete { expected_version },
            Some(row),
        ) if row.version == *expected_version => Ok(()),
        (WriteOp::Update { .. } | WriteOp::Delete { .. }, _) => {
            Err(AppError::conflict(&write.table, write.id))
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn scan(&self, table: &str) -> AppResult<Vec<Row>> {
        let state = self.state.read().await;
        Ok(state
            .tables
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn find(&self, table: &str, id: Uuid) -> AppResult<Option<Row>> {
        let state = self.state.read().await;
        Ok(state
            .tables
            .get(table)
            .and_then(|rows| rows.get(&id))
            .cloned())
    }

    async fn find_many(&self, table: &str, ids: &[Uuid]) -> AppResult<Vec<Row>> {
        let state = self.state.read().await;
        let Some(rows) = state.tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(ids.iter().filter_map(|id| rows.get(id)).cloned().collect())
    }

    async fn commit(&self, batch: CommitBatch) -> AppResult<u64> {
        let mut state = self.state.write().await;

        for write in &batch.writes {
            validate(&state, write)?;
        }

        let written = batch.writes.len() as u64;
        for write in batch.writes {
            let rows = state.tables.entry(write.table).or_default();
            match write.op {
                WriteOp::Insert { version, data } | WriteOp::Update { version, data, .. } => {
                    rows.insert(
                        write.id,
                        Row {
                            id: write.id,
                            version,
                            data,
                        },
                    );
                }
                WriteOp::Delete { .. } => {
                    rows.remove(&write.id);
                }
            }
        }
        state.audit_logs.extend(batch.audit_logs);

        tracing::debug!(written, "Memory store commit applied");
        Ok(written)
    }

    async fn audit_logs(&self, query: AuditQuery) -> AppResult<Vec<AuditLog>> {
        let state = self.state.read().await;
        let limit = query
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);
        Ok(state
            .audit_logs
            .iter()
            .rev()
            .filter(|log| query.matches(log))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn insert(table: &str, id: Uuid) -> RowWrite {
        RowWrite {
            table: table.into(),
            id,
            op: WriteOp::Insert {
                version: 1,
                data: json!({ "id": id }),
            },
        }
    }

    #[tokio::test]
    async fn stale_version_rejects_whole_batch() {
        let store = MemoryStore::new();
        let existing = Uuid::now_v7();
        store
            .commit(CommitBatch {
                writes: vec![insert("T", existing)],
                audit_logs: vec![],
            })
            .await
            .unwrap();

        let fresh = Uuid::now_v7();
        let result = store
            .commit(CommitBatch {
                writes: vec![
                    insert("T", fresh),
                    RowWrite {
                        table: "T".into(),
                        id: existing,
                        op: WriteOp::Update {
                            expected_version: 7,
                            version: 8,
                            data: json!({}),
                        },
                    },
                ],
                audit_logs: vec![],
            })
            .await;

        assert!(matches!(result, Err(AppError::ConcurrencyConflict { .. })));
        assert!(store.find("T", fresh).await.unwrap().is_none());
        assert_eq!(store.scan("T").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_insert_is_a_storage_error() {
        let store = MemoryStore::new();
        let id = Uuid::now_v7();
        let batch = CommitBatch {
            writes: vec![insert("T", id)],
            audit_logs: vec![],
        };
        store.commit(batch.clone()).await.unwrap();
        assert!(matches!(store.commit(batch).await, Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn delete_of_missing_row_conflicts() {
        let store = MemoryStore::new();
        let result = store
            .commit(CommitBatch {
                writes: vec![RowWrite {
                    table: "T".into(),
                    id: Uuid::now_v7(),
                    op: WriteOp::Delete { expected_version: 1 },
                }],
                audit_logs: vec![],
            })
            .await;
        assert!(matches!(result, Err(AppError::ConcurrencyConflict { .. })));
    }
}
