//! SeaORM entity definitions
//!
//! Database-specific shapes used by `SqlStore`, separate from domain models.

pub mod audit_log;
pub mod record;

// Re-exports for public API convenience
#[allow(unused_imports)]
pub use audit_log::{ActiveModel as AuditLogActiveModel, Entity as AuditLogEntity, Model as AuditLogModel};
#[allow(unused_imports)]
pub use record::{ActiveModel as RecordActiveModel, Entity as RecordEntity, Model as RecordModel};
