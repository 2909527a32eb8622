//! Storage abstraction under the unit of work.
//!
//! A store exposes the committed state of each table as serialized rows and
//! applies a `CommitBatch` atomically: either every write (including audit
//! rows) lands, or none does.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{AuditLog, AuditQuery};
use crate::errors::AppResult;

pub mod entities;
mod memory;
mod sql;

pub use memory::MemoryStore;
pub use sql::SqlStore;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Committed row of one entity table
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: Uuid,
    pub version: i64,
    pub data: Value,
}

/// One staged row mutation
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Insert {
        version: i64,
        data: Value,
    },
    /// Applied only if the committed version still equals `expected_version`.
    Update {
        expected_version: i64,
        version: i64,
        data: Value,
    },
    /// Applied only if the committed version still equals `expected_version`.
    Delete { expected_version: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowWrite {
    pub table: String,
    pub id: Uuid,
    pub op: WriteOp,
}

/// Everything one `save_changes` makes durable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitBatch {
    pub writes: Vec<RowWrite>,
    pub audit_logs: Vec<AuditLog>,
}

impl CommitBatch {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.audit_logs.is_empty()
    }
}

/// Durable storage behind sessions.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait Store: Send + Sync {
    /// All committed rows of `table`, ordered by id.
    async fn scan(&self, table: &str) -> AppResult<Vec<Row>>;

    async fn find(&self, table: &str, id: Uuid) -> AppResult<Option<Row>>;

    async fn find_many(&self, table: &str, ids: &[Uuid]) -> AppResult<Vec<Row>>;

    /// Apply `batch` atomically with optimistic version checks.
    ///
    /// Returns the number of entity rows written (audit rows excluded).
    async fn commit(&self, batch: CommitBatch) -> AppResult<u64>;

    /// Persisted audit rows, newest first.
    async fn audit_logs(&self, query: AuditQuery) -> AppResult<Vec<AuditLog>>;
}
