//! specrepo - Specification-driven repositories with a commit-time audit trail
//!
//! Callers describe reads as reusable `Specification` values, stage writes
//! through generic repositories, and commit everything atomically through a
//! `UnitOfWork`. Every committed change is recorded as an `AuditLog` row in
//! the same transaction.
//!
//! # Architecture Layers
//!
//! - **cli**: Command-line interface
//! - **commands**: CLI command implementations
//! - **config**: Application configuration and constants
//! - **domain**: Entity capability and the audit trail shape
//! - **specification**: Query specifications and their evaluator
//! - **infra**: Stores, session, repositories, unit of work, migrations
//! - **types**: Shared types (paging parameters, paginated results)
//! - **errors**: Centralized error handling
//!
//! # CLI Usage
//!
//! ```bash
//! # Run migrations
//! cargo run -- migrate up
//!
//! # Show the latest audit rows for one table
//! cargo run -- audit --table Product --limit 20
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infra;
pub mod specification;
pub mod types;

// Re-export commonly used types at crate root
pub use config::Config;
pub use domain::{AuditLog, AuditType, Entity, Metadata, SoftDelete};
pub use errors::{AppError, AppResult};
pub use infra::{
    AuditInterceptor, MemoryStore, ReadRepository, Repository, RepositoryFactory, SqlStore, Store,
    UnitOfWork, WriteRepository,
};
pub use specification::{Criteria, Specification, SpecificationEvaluator};
pub use types::{Paginated, SpecificationParams};
