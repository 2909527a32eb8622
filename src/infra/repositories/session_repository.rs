//! Generic repository bound to a change-tracking session.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::try_join_all;
use serde_json::Value;
use uuid::Uuid;

use super::base::{ReadRepository, WriteRepository};
use crate::domain::Entity;
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::session::{EntityState, Session};
use crate::specification::{RowSource, Specification, SpecificationEvaluator};
use crate::types::{Paginated, SpecificationParams};

/// Repository for one entity type.
///
/// Reads see committed rows overlaid with the session's own staged changes.
/// Writes only stage; nothing reaches the store before `save_changes`. Over a
/// read-only session every write fails with `Validation`.
pub struct Repository<T: Entity> {
    session: Arc<Session>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            _entity: PhantomData,
        }
    }

    /// One page of `spec` plus the total across all pages.
    pub async fn page_with_spec(
        &self,
        spec: &Specification<T>,
        params: &SpecificationParams,
    ) -> AppResult<Paginated<T>> {
        let total = self.count_with_spec(spec).await?;
        let data = self.list_with_spec(&spec.clone().paginate(params)).await?;
        Ok(Paginated::new(
            data,
            params.effective_page_index(),
            params.effective_page_size(),
            total,
        ))
    }

    async fn visible(&self) -> AppResult<Vec<T>> {
        self.session
            .rows(T::TABLE_NAME)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    async fn query(&self, spec: &Specification<T>) -> AppResult<Vec<T>> {
        let filtered = SpecificationEvaluator::apply_filter(spec, self.visible().await?)?;

        let attachers = try_join_all(
            spec.includes()
                .iter()
                .map(|navigation| navigation.prefetch(&filtered, &*self.session)),
        )
        .await?;

        Ok(SpecificationEvaluator::evaluate_filtered(spec, filtered, &attachers))
    }
}

fn decode<T: Entity>(row: Value) -> AppResult<T> {
    Ok(serde_json::from_value(row)?)
}

#[async_trait]
impl<T: Entity> ReadRepository<T> for Repository<T> {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<T>> {
        Ok(self
            .get_by_id_with_deleted(id)
            .await?
            .filter(|entity| !entity.is_deleted()))
    }

    async fn get_by_id_with_deleted(&self, id: Uuid) -> AppResult<Option<T>> {
        match self.session.visible_row(T::TABLE_NAME, id).await? {
            Some(row) => Ok(Some(decode(row)?)),
            None => Ok(None),
        }
    }

    async fn get_one_with_spec(&self, spec: &Specification<T>) -> AppResult<Option<T>> {
        Ok(self.query(spec).await?.into_iter().next())
    }

    async fn list_with_spec(&self, spec: &Specification<T>) -> AppResult<Vec<T>> {
        self.query(spec).await
    }

    async fn count_with_spec(&self, spec: &Specification<T>) -> AppResult<u64> {
        SpecificationEvaluator::count(spec, self.visible().await?)
    }
}

#[async_trait]
impl<T: Entity> WriteRepository<T> for Repository<T> {
    async fn add(&self, mut entity: T) -> AppResult<Uuid> {
        self.session.ensure_writable()?;
        if entity.id().is_nil() {
            entity.set_id(Uuid::now_v7());
        }
        let id = entity.id();
        self.session
            .stage_added(T::TABLE_NAME, id, serde_json::to_value(&entity)?)?;
        Ok(id)
    }

    async fn update(&self, entity: T) -> AppResult<()> {
        self.session.ensure_writable()?;
        let id = entity.id();
        let current = serde_json::to_value(&entity)?;

        if self.session.state_of(T::TABLE_NAME, id).is_some() {
            return self
                .session
                .restage(T::TABLE_NAME, id, current, EntityState::Modified);
        }

        let committed = self
            .session
            .committed_row(T::TABLE_NAME, id)
            .await?
            .ok_or_not_found()?;
        self.session.attach(
            T::TABLE_NAME,
            id,
            committed.data,
            current,
            EntityState::Modified,
            entity.version(),
        )
    }

    async fn remove(&self, mut entity: T) -> AppResult<()> {
        self.session.ensure_writable()?;
        let id = entity.id();
        match self.session.state_of(T::TABLE_NAME, id) {
            Some(EntityState::Added) => {
                self.session.detach(T::TABLE_NAME, id);
                return Ok(());
            }
            Some(EntityState::Deleted) => return Err(AppError::NotFound),
            _ => {}
        }

        if !entity.is_soft_deletable() {
            return self.purge(entity).await;
        }

        if self.get_by_id(id).await?.is_none() {
            return Err(AppError::NotFound);
        }
        let user = self.session.user_id().to_string();
        if let Some(deletion) = entity.soft_delete_mut() {
            deletion.mark(&user, Utc::now());
        }
        self.update(entity).await
    }

    async fn purge(&self, entity: T) -> AppResult<()> {
        self.session.ensure_writable()?;
        let id = entity.id();
        match self.session.state_of(T::TABLE_NAME, id) {
            Some(EntityState::Added) => {
                self.session.detach(T::TABLE_NAME, id);
                Ok(())
            }
            Some(EntityState::Deleted) => Err(AppError::NotFound),
            Some(_) => {
                let current = serde_json::to_value(&entity)?;
                self.session
                    .restage(T::TABLE_NAME, id, current, EntityState::Deleted)
            }
            None => {
                let committed = self
                    .session
                    .committed_row(T::TABLE_NAME, id)
                    .await?
                    .ok_or_not_found()?;
                self.session.attach(
                    T::TABLE_NAME,
                    id,
                    committed.data.clone(),
                    committed.data,
                    EntityState::Deleted,
                    entity.version(),
                )
            }
        }
    }

    async fn restore(&self, mut entity: T) -> AppResult<()> {
        self.session.ensure_writable()?;
        let id = entity.id();
        match entity.soft_delete_mut() {
            None => {
                return Err(AppError::validation(format!(
                    "{} does not support soft delete",
                    T::TABLE_NAME
                )))
            }
            Some(deletion) if !deletion.is_deleted => {
                return Err(AppError::validation(format!(
                    "{} {id} is not deleted",
                    T::TABLE_NAME
                )))
            }
            Some(deletion) => deletion.clear(),
        }
        self.update(entity).await
    }
}
