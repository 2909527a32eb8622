//! Entity capability shared by every repository-managed record.
//!
//! Entities are plain serde structs. Their serialized top-level keys are the
//! columns the session snapshots, diffs and audits, so the metadata and
//! soft-delete blocks are meant to be embedded with `#[serde(flatten)]`.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// Primary key column of every entity
pub const KEY_COLUMN: &str = "id";

/// Column flipped by a soft delete
pub const IS_DELETED_COLUMN: &str = "is_deleted";

/// Audit metadata carried by every entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub active: bool,
    pub created_by: Option<String>,
    pub created_on: Option<DateTime<Utc>>,
    pub last_modified_by: Option<String>,
    pub last_modified_on: Option<DateTime<Utc>>,
    /// Optimistic-concurrency counter, incremented on every committed write
    pub version: i64,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            active: true,
            created_by: None,
            created_on: None,
            last_modified_by: None,
            last_modified_on: None,
            version: 0,
        }
    }
}

/// Soft-delete fields for entities that are never physically removed by default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoftDelete {
    pub is_deleted: bool,
    pub deleted_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SoftDelete {
    /// Mark as deleted by `user` at `at`
    pub fn mark(&mut self, user: &str, at: DateTime<Utc>) {
        self.is_deleted = true;
        self.deleted_by = Some(user.to_string());
        self.deleted_at = Some(at);
    }

    /// Clear the deletion marker
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// A record with an identity that a `Repository` can manage.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Logical table name, also recorded on audit rows.
    const TABLE_NAME: &'static str;

    fn id(&self) -> Uuid;

    fn set_id(&mut self, id: Uuid);

    fn metadata(&self) -> &Metadata;

    fn metadata_mut(&mut self) -> &mut Metadata;

    /// Soft-delete block, `None` for entities that are physically removed.
    fn soft_delete(&self) -> Option<&SoftDelete> {
        None
    }

    fn soft_delete_mut(&mut self) -> Option<&mut SoftDelete> {
        None
    }

    fn is_soft_deletable(&self) -> bool {
        self.soft_delete().is_some()
    }

    fn is_deleted(&self) -> bool {
        self.soft_delete().is_some_and(|s| s.is_deleted)
    }

    fn version(&self) -> i64 {
        self.metadata().version
    }
}
