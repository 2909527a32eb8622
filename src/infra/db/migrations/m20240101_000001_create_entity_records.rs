//! Migration: Create the shared entity records table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EntityRecords::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(EntityRecords::EntityTable).string().not_null())
                    .col(ColumnDef::new(EntityRecords::Id).uuid().not_null())
                    .col(
                        ColumnDef::new(EntityRecords::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(EntityRecords::Data).text().not_null())
                    .primary_key(
                        Index::create()
                            .col(EntityRecords::EntityTable)
                            .col(EntityRecords::Id),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EntityRecords::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum EntityRecords {
    Table,
    EntityTable,
    Id,
    Version,
    Data,
}
