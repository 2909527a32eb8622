//! Infrastructure layer - Persistence and change tracking
//!
//! This module handles all storage concerns:
//! - Stores (in-memory and SeaORM-backed) and database migrations
//! - The change-tracking session and its audit interceptor
//! - Generic repositories and the Unit of Work that commits them

pub mod audit;
pub mod db;
pub mod repositories;
pub mod session;
pub mod store;
pub mod unit_of_work;

pub use audit::{AuditEntry, AuditInterceptor};
pub use db::{Database, Migrator};
pub use repositories::{
    CrudRepository, ReadRepository, Repository, RepositoryFactory, WriteRepository,
};
pub use session::{ChangeKind, EntityState, PendingChange, Session};
pub use store::{CommitBatch, MemoryStore, Row, RowWrite, SqlStore, Store, WriteOp};
pub use unit_of_work::UnitOfWork;

#[cfg(any(test, feature = "test-utils"))]
pub use store::MockStore;
