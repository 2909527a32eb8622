//! SeaORM-backed store.
//!
//! Each commit runs in one database transaction. Updates and deletes carry
//! `version = expected` in their WHERE clause, and a zero row count aborts
//! the transaction with a concurrency conflict.

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use super::entities::{audit_log, record};
use super::{CommitBatch, Row, RowWrite, Store, WriteOp};
use crate::domain::{AuditLog, AuditQuery};
use crate::errors::{AppError, AppResult};

/// Store persisting rows through a SeaORM connection
#[derive(Clone)]
pub struct SqlStore {
    db: DatabaseConnection,
}

impl SqlStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Get database connection reference
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn apply(txn: &DatabaseTransaction, batch: CommitBatch) -> AppResult<u64> {
        let mut written = 0;
        for write in batch.writes {
            Self::apply_write(txn, write).await?;
            written += 1;
        }

        for log in batch.audit_logs {
            audit_log::Entity::insert(audit_log::ActiveModel::from(log))
                .exec_without_returning(txn)
                .await?;
        }

        Ok(written)
    }

    async fn apply_write(txn: &DatabaseTransaction, write: RowWrite) -> AppResult<()> {
        let RowWrite { table, id, op } = write;
        match op {
            WriteOp::Insert { version, data } => {
                let model = record::ActiveModel {
                    entity_table: Set(table),
                    id: Set(id),
                    version: Set(version),
                    data: Set(data.to_string()),
                };
                record::Entity::insert(model)
                    .exec_without_returning(txn)
                    .await?;
            }
            WriteOp::Update {
                expected_version,
                version,
                data,
            } => {
                let result = record::Entity::update_many()
                    .col_expr(record::Column::Version, Expr::value(version))
                    .col_expr(record::Column::Data, Expr::value(data.to_string()))
                    .filter(record::Column::EntityTable.eq(table.as_str()))
                    .filter(record::Column::Id.eq(id))
                    .filter(record::Column::Version.eq(expected_version))
                    .exec(txn)
                    .await?;
                if result.rows_affected == 0 {
                    return Err(AppError::conflict(table, id));
                }
            }
            WriteOp::Delete { expected_version } => {
                let result = record::Entity::delete_many()
                    .filter(record::Column::EntityTable.eq(table.as_str()))
                    .filter(record::Column::Id.eq(id))
                    .filter(record::Column::Version.eq(expected_version))
                    .exec(txn)
                    .await?;
                if result.rows_affected == 0 {
                    return Err(AppError::conflict(table, id));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for SqlStore {
    async fn scan(&self, table: &str) -> AppResult<Vec<Row>> {
        record::Entity::find()
            .filter(record::Column::EntityTable.eq(table))
            .order_by_asc(record::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(record::Model::into_row)
            .collect()
    }

    async fn find(&self, table: &str, id: Uuid) -> AppResult<Option<Row>> {
        record::Entity::find_by_id((table.to_string(), id))
            .one(&self.db)
            .await?
            .map(record::Model::into_row)
            .transpose()
    }

    async fn find_many(&self, table: &str, ids: &[Uuid]) -> AppResult<Vec<Row>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        record::Entity::find()
            .filter(record::Column::EntityTable.eq(table))
            .filter(record::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(record::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(record::Model::into_row)
            .collect()
    }

    async fn commit(&self, batch: CommitBatch) -> AppResult<u64> {
        if batch.is_empty() {
            return Ok(0);
        }
        let txn = self.db.begin().await.map_err(AppError::from)?;

        match Self::apply(&txn, batch).await {
            Ok(written) => {
                txn.commit().await.map_err(AppError::from)?;
                tracing::debug!(written, "SQL store commit applied");
                Ok(written)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn audit_logs(&self, query: AuditQuery) -> AppResult<Vec<AuditLog>> {
        let mut select = audit_log::Entity::find()
            .order_by_desc(audit_log::Column::DateTime)
            .order_by_desc(audit_log::Column::Id);
        if let Some(table) = query.table_name.as_deref() {
            select = select.filter(audit_log::Column::TableName.eq(table));
        }
        if let Some(limit) = query.limit {
            select = select.limit(limit);
        }

        select
            .all(&self.db)
            .await?
            .into_iter()
            .map(audit_log::Model::into_domain)
            .collect()
    }
}
