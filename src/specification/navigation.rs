//! Eager-load navigations ("includes").
//!
//! A navigation prefetches related rows from a `RowSource` and returns an
//! attacher the evaluator applies to each candidate in its include step.

use std::collections::{BTreeSet, HashMap};
use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::Entity;
use crate::errors::AppResult;

/// Closure that populates one navigation on an entity.
pub type Attach<T> = Box<dyn Fn(&mut T) + Send + Sync>;

/// Read access to serialized rows, as seen by the current session.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Every visible row of `table`, ordered by id.
    async fn rows(&self, table: &'static str) -> AppResult<Vec<Value>>;

    /// Visible rows of `table` whose id is in `ids`.
    async fn rows_by_id(&self, table: &'static str, ids: &[Uuid]) -> AppResult<Vec<Value>>;
}

/// A related-entity path that a specification can eagerly load.
#[async_trait]
pub trait Navigation<T: Send + Sync + 'static>: Send + Sync {
    /// Navigation path, e.g. `"category"`.
    fn path(&self) -> &str;

    async fn prefetch(&self, items: &[T], source: &dyn RowSource) -> AppResult<Attach<T>>;
}

fn decode_visible<R: Entity>(rows: Vec<Value>) -> AppResult<Vec<R>> {
    let mut decoded = Vec::with_capacity(rows.len());
    for row in rows {
        let entity: R = serde_json::from_value(row)?;
        if !entity.is_deleted() {
            decoded.push(entity);
        }
    }
    Ok(decoded)
}

/// Many-to-one navigation: `T` holds the key of one `R`.
pub struct Reference<T, R> {
    path: &'static str,
    key: fn(&T) -> Option<Uuid>,
    assign: fn(&mut T, R),
    _related: PhantomData<fn() -> R>,
}

impl<T, R> Reference<T, R> {
    pub fn new(path: &'static str, key: fn(&T) -> Option<Uuid>, assign: fn(&mut T, R)) -> Self {
        Self {
            path,
            key,
            assign,
            _related: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Entity, R: Entity> Navigation<T> for Reference<T, R> {
    fn path(&self) -> &str {
        self.path
    }

    async fn prefetch(&self, items: &[T], source: &dyn RowSource) -> AppResult<Attach<T>> {
        let ids: Vec<Uuid> = items
            .iter()
            .filter_map(|item| (self.key)(item))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let related: HashMap<Uuid, R> = if ids.is_empty() {
            HashMap::new()
        } else {
            decode_visible::<R>(source.rows_by_id(R::TABLE_NAME, &ids).await?)?
                .into_iter()
                .map(|r| (r.id(), r))
                .collect()
        };

        tracing::debug!(path = self.path, loaded = related.len(), "Prefetched reference");

        let key = self.key;
        let assign = self.assign;
        Ok(Box::new(move |item: &mut T| {
            if let Some(found) = key(item).and_then(|id| related.get(&id)) {
                assign(item, found.clone());
            }
        }))
    }
}

/// One-to-many navigation: each `R` holds the key of its owning `T`.
pub struct Collection<T, R> {
    path: &'static str,
    foreign_key: fn(&R) -> Option<Uuid>,
    assign: fn(&mut T, Vec<R>),
    _owner: PhantomData<fn() -> T>,
}

impl<T, R> Collection<T, R> {
    pub fn new(
        path: &'static str,
        foreign_key: fn(&R) -> Option<Uuid>,
        assign: fn(&mut T, Vec<R>),
    ) -> Self {
        Self {
            path,
            foreign_key,
            assign,
            _owner: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Entity, R: Entity> Navigation<T> for Collection<T, R> {
    fn path(&self) -> &str {
        self.path
    }

    async fn prefetch(&self, items: &[T], source: &dyn RowSource) -> AppResult<Attach<T>> {
        let owners: BTreeSet<Uuid> = items.iter().map(|item| item.id()).collect();

        let mut groups: HashMap<Uuid, Vec<R>> = HashMap::new();
        if !owners.is_empty() {
            for child in decode_visible::<R>(source.rows(R::TABLE_NAME).await?)? {
                if let Some(owner) = (self.foreign_key)(&child).filter(|o| owners.contains(o)) {
                    groups.entry(owner).or_default().push(child);
                }
            }
        }

        tracing::debug!(path = self.path, owners = groups.len(), "Prefetched collection");

        let assign = self.assign;
        Ok(Box::new(move |item: &mut T| {
            let children = groups.get(&item.id()).cloned().unwrap_or_default();
            assign(item, children);
        }))
    }
}
