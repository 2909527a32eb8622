//! Migration: Create the append-only audit log table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuditLogs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AuditLogs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(AuditLogs::UserId).string().not_null())
                    .col(ColumnDef::new(AuditLogs::Type).string().not_null())
                    .col(ColumnDef::new(AuditLogs::TableName).string().not_null())
                    .col(
                        ColumnDef::new(AuditLogs::DateTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AuditLogs::OldValues).text().null())
                    .col(ColumnDef::new(AuditLogs::NewValues).text().null())
                    .col(ColumnDef::new(AuditLogs::AffectedColumns).text().null())
                    .col(ColumnDef::new(AuditLogs::PrimaryKey).text().not_null())
                    .to_owned(),
            )
            .await?;

        // Audit history is usually browsed per table, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_audit_logs_table_name_date_time")
                    .table(AuditLogs::Table)
                    .col(AuditLogs::TableName)
                    .col(AuditLogs::DateTime)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_audit_logs_table_name_date_time")
                    .table(AuditLogs::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AuditLogs {
    Table,
    Id,
    UserId,
    Type,
    TableName,
    DateTime,
    OldValues,
    NewValues,
    AffectedColumns,
    PrimaryKey,
}
