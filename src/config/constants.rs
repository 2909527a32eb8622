//! Application-wide constants
//!
//! Centralized location for magic values to improve maintainability.

// =============================================================================
// Pagination
// =============================================================================

/// Default number of items per page (used when page size is unset or zero)
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Default starting page number (1-indexed)
pub const DEFAULT_PAGE_NUMBER: u64 = 1;

// =============================================================================
// Auditing
// =============================================================================

/// Table holding persisted audit rows; entities in it are never audited
pub const AUDIT_TABLE_NAME: &str = "audit_logs";

/// User recorded on audit rows when none is configured
pub const DEFAULT_AUDIT_USER: &str = "system";

/// Default number of audit rows listed by the CLI
pub const DEFAULT_AUDIT_LIST_LIMIT: u64 = 50;

// =============================================================================
// Database
// =============================================================================

/// Default database connection URL (for development)
pub const DEFAULT_DATABASE_URL: &str = "sqlite://specrepo.db?mode=rwc";

/// Table holding serialized entity rows for the SQL store
pub const ENTITY_RECORDS_TABLE: &str = "entity_records";
