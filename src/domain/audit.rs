//! Persisted audit trail shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of change an audit row records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditType {
    Create,
    Update,
    Delete,
}

impl AuditType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditType::Create => "Create",
            AuditType::Update => "Update",
            AuditType::Delete => "Delete",
        }
    }
}

impl std::fmt::Display for AuditType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Create" => Ok(AuditType::Create),
            "Update" => Ok(AuditType::Update),
            "Delete" => Ok(AuditType::Delete),
            other => Err(format!("unknown audit type: {other}")),
        }
    }
}

/// Append-only audit row written in the same commit as the change it describes.
///
/// Value columns hold JSON text and are `None` when there is nothing to record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: String,
    pub audit_type: AuditType,
    pub table_name: String,
    pub date_time: DateTime<Utc>,
    pub old_values: Option<String>,
    pub new_values: Option<String>,
    pub affected_columns: Option<String>,
    pub primary_key: String,
}

impl AuditLog {
    /// Decoded `affected_columns`, empty when absent
    pub fn affected_column_names(&self) -> Vec<String> {
        self.affected_columns
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

/// Filter for reading audit rows back, newest first.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub table_name: Option<String>,
    pub limit: Option<u64>,
}

impl AuditQuery {
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table_name: Some(table.into()),
            limit: None,
        }
    }

    pub fn matches(&self, log: &AuditLog) -> bool {
        self.table_name
            .as_deref()
            .map_or(true, |t| t == log.table_name)
    }
}
