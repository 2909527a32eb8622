//! Shared types for DRY compliance.

mod pagination;

pub use pagination::{Paginated, PaginationMeta, SpecificationParams};
