//! Unit of Work pattern implementation.
//!
//! A unit of work owns one change-tracking session. Every repository it hands
//! out stages into that session, and `save_changes` is the single commit
//! point: all staged changes plus their audit rows land atomically, or
//! nothing does.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::repositories::Repository;
use super::session::Session;
use super::store::Store;
use crate::domain::Entity;
use crate::errors::AppResult;

/// One business transaction over a store.
pub struct UnitOfWork {
    session: Arc<Session>,
}

impl UnitOfWork {
    pub fn new(store: Arc<dyn Store>, user_id: impl Into<String>) -> Self {
        Self {
            session: Arc::new(Session::new(store, user_id)),
        }
    }

    /// Repository bound to this unit's session (the same session for every entity type).
    pub fn repository<T: Entity>(&self) -> Repository<T> {
        Repository::new(Arc::clone(&self.session))
    }

    /// Commit all staged changes and their audit rows.
    ///
    /// Returns the number of entity rows written. Cancellation is honoured
    /// only before the store write. On failure the staged changes are kept.
    pub async fn save_changes(&self, cancel: &CancellationToken) -> AppResult<usize> {
        self.session.save_changes(cancel).await
    }

    pub fn has_changes(&self) -> bool {
        self.session.has_changes()
    }

    /// Drop every staged change without touching the store.
    pub fn discard_changes(&self) {
        self.session.discard_changes();
        tracing::debug!(user = %self.session.user_id(), "Staged changes discarded");
    }

    pub fn user_id(&self) -> &str {
        self.session.user_id()
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        self.session.store()
    }
}
