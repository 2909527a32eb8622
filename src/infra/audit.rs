//! Save-time audit interception.
//!
//! Before a commit the session hands its pending changes to the interceptor,
//! which turns each one into an `AuditEntry`. Entries become `AuditLog` rows
//! that travel in the same batch as the entity writes.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::session::{ChangeKind, PendingChange};
use crate::config::AUDIT_TABLE_NAME;
use crate::domain::{AuditLog, AuditType, KEY_COLUMN};
use crate::errors::AppResult;

/// Transient audit record for one pending change.
#[derive(Debug, Clone)]
pub struct AuditEntry<'a> {
    /// Change this entry describes
    pub entry: &'a PendingChange,
    pub user_id: String,
    pub table_name: String,
    pub audit_type: AuditType,
    pub key_values: Map<String, Value>,
    pub old_values: Map<String, Value>,
    pub new_values: Map<String, Value>,
    pub changed_columns: Vec<String>,
}

impl AuditEntry<'_> {
    /// Persistable audit row. Empty maps and lists are stored as `None`.
    pub fn to_audit_log(&self, at: DateTime<Utc>) -> AppResult<AuditLog> {
        Ok(AuditLog {
            id: Uuid::now_v7(),
            user_id: self.user_id.clone(),
            audit_type: self.audit_type,
            table_name: self.table_name.clone(),
            date_time: at,
            old_values: json_text(&self.old_values)?,
            new_values: json_text(&self.new_values)?,
            affected_columns: if self.changed_columns.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&self.changed_columns)?)
            },
            primary_key: serde_json::to_string(&self.key_values)?,
        })
    }
}

fn json_text(values: &Map<String, Value>) -> AppResult<Option<String>> {
    if values.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(values)?))
}

fn columns(row: Option<&Value>) -> Map<String, Value> {
    match row {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

/// Builds audit entries for every pending change outside the audit table.
#[derive(Debug, Clone)]
pub struct AuditInterceptor {
    audit_table: String,
}

impl Default for AuditInterceptor {
    fn default() -> Self {
        Self::new(AUDIT_TABLE_NAME)
    }
}

impl AuditInterceptor {
    pub fn new(audit_table: impl Into<String>) -> Self {
        Self {
            audit_table: audit_table.into(),
        }
    }

    pub fn audit_table(&self) -> &str {
        &self.audit_table
    }

    /// One entry per change, in staging order.
    pub fn on_saving<'a>(&self, changes: &'a [PendingChange], user_id: &str) -> Vec<AuditEntry<'a>> {
        let entries: Vec<AuditEntry<'a>> = changes
            .iter()
            .filter(|change| change.table != self.audit_table)
            .map(|change| Self::entry(change, user_id))
            .collect();
        tracing::debug!(changes = changes.len(), entries = entries.len(), "Audit entries built");
        entries
    }

    fn entry<'a>(change: &'a PendingChange, user_id: &str) -> AuditEntry<'a> {
        let mut old = columns(change.original.as_ref());
        let mut new = columns(change.current.as_ref());

        let mut key_values = Map::new();
        key_values.insert(KEY_COLUMN.to_string(), Value::String(change.id.to_string()));
        old.remove(KEY_COLUMN);
        new.remove(KEY_COLUMN);

        let (audit_type, old_values, new_values, changed_columns) = match change.kind {
            ChangeKind::Insert => {
                let changed = new.keys().cloned().collect();
                (AuditType::Create, Map::new(), new, changed)
            }
            ChangeKind::Delete => {
                let changed = old.keys().cloned().collect();
                (AuditType::Delete, old, Map::new(), changed)
            }
            ChangeKind::Update | ChangeKind::SoftDelete => {
                let (old_values, new_values, changed) = diff(&old, &new);
                let audit_type = if change.kind == ChangeKind::SoftDelete {
                    AuditType::Delete
                } else {
                    AuditType::Update
                };
                (audit_type, old_values, new_values, changed)
            }
        };

        AuditEntry {
            entry: change,
            user_id: user_id.to_string(),
            table_name: change.table.to_string(),
            audit_type,
            key_values,
            old_values,
            new_values,
            changed_columns,
        }
    }
}

/// Columns whose value differs, with before and after values.
fn diff(
    old: &Map<String, Value>,
    new: &Map<String, Value>,
) -> (Map<String, Value>, Map<String, Value>, Vec<String>) {
    let mut old_values = Map::new();
    let mut new_values = Map::new();
    let mut changed = Vec::new();

    let mut names: Vec<&String> = old.keys().chain(new.keys()).collect();
    names.sort();
    names.dedup();

    for name in names {
        let before = old.get(name).cloned().unwrap_or(Value::Null);
        let after = new.get(name).cloned().unwrap_or(Value::Null);
        if before != after {
            old_values.insert(name.clone(), before);
            new_values.insert(name.clone(), after);
            changed.push(name.clone());
        }
    }

    (old_values, new_values, changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(kind: ChangeKind, original: Option<Value>, current: Option<Value>) -> PendingChange {
        PendingChange {
            table: "Product",
            id: Uuid::from_u128(7),
            kind,
            original,
            current,
            expected_version: Some(1),
            version: 2,
        }
    }

    #[test]
    fn update_records_only_changed_columns() {
        let changes = vec![change(
            ChangeKind::Update,
            Some(json!({"id": "x", "name": "Hammer", "price": 10, "version": 1})),
            Some(json!({"id": "x", "name": "Hammer", "price": 12, "version": 2})),
        )];
        let entries = AuditInterceptor::default().on_saving(&changes, "alice");
        let entry = &entries[0];

        assert_eq!(entry.audit_type, AuditType::Update);
        assert_eq!(entry.changed_columns, vec!["price", "version"]);
        assert_eq!(entry.old_values.get("price"), Some(&json!(10)));
        assert!(!entry.new_values.contains_key("name"));
        assert!(std::ptr::eq(entry.entry, &changes[0]));
    }

    #[test]
    fn insert_has_no_old_values() {
        let changes = vec![change(ChangeKind::Insert, None, Some(json!({"id": "x", "name": "Tools"})))];
        let log = AuditInterceptor::default().on_saving(&changes, "alice")[0]
            .to_audit_log(Utc::now())
            .unwrap();

        assert_eq!(log.audit_type, AuditType::Create);
        assert!(log.old_values.is_none());
        assert_eq!(log.new_values.as_deref(), Some(r#"{"name":"Tools"}"#));
        assert_eq!(log.primary_key, format!(r#"{{"id":"{}"}}"#, Uuid::from_u128(7)));
    }

    #[test]
    fn soft_delete_is_audited_as_delete() {
        let changes = vec![change(
            ChangeKind::SoftDelete,
            Some(json!({"id": "x", "is_deleted": false})),
            Some(json!({"id": "x", "is_deleted": true})),
        )];
        let entry = &AuditInterceptor::default().on_saving(&changes, "alice")[0];
        assert_eq!(entry.audit_type, AuditType::Delete);
        assert_eq!(entry.changed_columns, vec!["is_deleted"]);
    }

    #[test]
    fn audit_table_changes_are_skipped() {
        let mut audit_row = change(ChangeKind::Insert, None, Some(json!({})));
        audit_row.table = AUDIT_TABLE_NAME;
        assert!(AuditInterceptor::default().on_saving(&[audit_row], "alice").is_empty());
    }
}
