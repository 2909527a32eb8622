//! Entry point for obtaining repositories and units of work.

use std::sync::Arc;

use super::session_repository::Repository;
use crate::config::Config;
use crate::domain::Entity;
use crate::infra::session::Session;
use crate::infra::store::Store;
use crate::infra::unit_of_work::UnitOfWork;

/// Hands out repositories and units of work over one store for one user.
#[derive(Clone)]
pub struct RepositoryFactory {
    store: Arc<dyn Store>,
    user_id: String,
}

impl RepositoryFactory {
    pub fn new(store: Arc<dyn Store>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
        }
    }

    /// Factory acting as the configured audit user.
    pub fn from_config(store: Arc<dyn Store>, config: &Config) -> Self {
        Self::new(store, config.audit_user.clone())
    }

    /// Read-only repository over a fresh private session.
    ///
    /// Its session can never be saved, so every write on it fails with
    /// `Validation`; writes go through `unit_of_work()`.
    pub fn get_repository<T: Entity>(&self) -> Repository<T> {
        Repository::new(Arc::new(Session::read_only(
            Arc::clone(&self.store),
            self.user_id.clone(),
        )))
    }

    /// Begin a new unit of work.
    pub fn unit_of_work(&self) -> UnitOfWork {
        UnitOfWork::new(Arc::clone(&self.store), self.user_id.clone())
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}
