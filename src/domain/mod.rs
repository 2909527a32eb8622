//! Domain layer - Core data-access abstractions
//!
//! Entities managed by repositories and the audit trail they produce.
//! No infrastructure dependencies.

pub mod audit;
pub mod entity;

pub use audit::{AuditLog, AuditQuery, AuditType};
pub use entity::{Entity, Metadata, SoftDelete, IS_DELETED_COLUMN, KEY_COLUMN};
