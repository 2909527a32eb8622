//! Base repository traits following Interface Segregation Principle (ISP).
//!
//! Reads and writes are split so callers can depend on only what they use;
//! `CrudRepository` is implemented for anything providing both.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::Entity;
use crate::errors::AppResult;
use crate::specification::Specification;

/// Read operations (Query). Side-effect free.
#[async_trait]
pub trait ReadRepository<T: Entity>: Send + Sync {
    /// Visible entity by key; soft-deleted rows are hidden.
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<T>>;

    /// Entity by key, soft-deleted or not.
    async fn get_by_id_with_deleted(&self, id: Uuid) -> AppResult<Option<T>>;

    /// First row after full evaluation (filter, includes, ordering, paging).
    async fn get_one_with_spec(&self, spec: &Specification<T>) -> AppResult<Option<T>>;

    async fn list_with_spec(&self, spec: &Specification<T>) -> AppResult<Vec<T>>;

    /// Rows matching the filter; includes, ordering and paging are ignored.
    async fn count_with_spec(&self, spec: &Specification<T>) -> AppResult<u64>;

    async fn exists(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.get_by_id(id).await?.is_some())
    }

    async fn list_all(&self) -> AppResult<Vec<T>> {
        self.list_with_spec(&Specification::new()).await
    }
}

/// Write operations (Command). Everything is staged until the unit of work saves.
#[async_trait]
pub trait WriteRepository<T: Entity>: Send + Sync {
    /// Stage an insert and return the entity key (generated when nil).
    async fn add(&self, entity: T) -> AppResult<Uuid>;

    async fn update(&self, entity: T) -> AppResult<()>;

    /// Soft delete when supported, physical delete otherwise.
    async fn remove(&self, entity: T) -> AppResult<()>;

    /// Physical delete regardless of soft-delete support.
    async fn purge(&self, entity: T) -> AppResult<()>;

    /// Clear the soft-delete marker of a deleted entity.
    async fn restore(&self, entity: T) -> AppResult<()>;
}

/// Full CRUD repository - Combines all operations
pub trait CrudRepository<T: Entity>: ReadRepository<T> + WriteRepository<T> {}

impl<R, T> CrudRepository<T> for R
where
    R: ReadRepository<T> + WriteRepository<T>,
    T: Entity,
{
}
