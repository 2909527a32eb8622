//! Serialized entity row for SeaORM.
//!
//! Every repository-managed table shares `entity_records`, keyed by
//! `(entity_table, id)`; the entity itself is stored as JSON text.

use sea_orm::entity::prelude::*;

use crate::errors::AppResult;
use crate::infra::store::Row;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "entity_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub entity_table: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub version: i64,
    #[sea_orm(column_type = "Text")]
    pub data: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Decode into a store row
    pub fn into_row(self) -> AppResult<Row> {
        Ok(Row {
            id: self.id,
            version: self.version,
            data: serde_json::from_str(&self.data)?,
        })
    }
}
