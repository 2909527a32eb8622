//! Audit log database entity for SeaORM.

use sea_orm::entity::prelude::*;
use sea_orm::Set;

use crate::domain::AuditLog;
use crate::errors::{AppError, AppResult};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    #[sea_orm(column_name = "type")]
    pub audit_type: String,
    pub table_name: String,
    pub date_time: DateTimeUtc,
    #[sea_orm(column_type = "Text", nullable)]
    pub old_values: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub new_values: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub affected_columns: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub primary_key: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Convert domain audit row to an insertable model
impl From<AuditLog> for ActiveModel {
    fn from(log: AuditLog) -> Self {
        ActiveModel {
            id: Set(log.id),
            user_id: Set(log.user_id),
            audit_type: Set(log.audit_type.to_string()),
            table_name: Set(log.table_name),
            date_time: Set(log.date_time),
            old_values: Set(log.old_values),
            new_values: Set(log.new_values),
            affected_columns: Set(log.affected_columns),
            primary_key: Set(log.primary_key),
        }
    }
}

impl Model {
    /// Convert database model to the domain audit row
    pub fn into_domain(self) -> AppResult<AuditLog> {
        Ok(AuditLog {
            id: self.id,
            user_id: self.user_id,
            audit_type: self.audit_type.parse().map_err(AppError::internal)?,
            table_name: self.table_name,
            date_time: self.date_time,
            old_values: self.old_values,
            new_values: self.new_values,
            affected_columns: self.affected_columns,
            primary_key: self.primary_key,
        })
    }
}
