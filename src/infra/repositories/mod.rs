//! Repository layer - Data access abstraction
//!
//! Repositories provide an abstraction over data persistence,
//! following the Repository pattern for clean separation of concerns.

mod base;
mod factory;
mod session_repository;

pub use base::{CrudRepository, ReadRepository, WriteRepository};
pub use factory::RepositoryFactory;
pub use session_repository::Repository;
