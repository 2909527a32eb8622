//! Specification pattern - reusable, type-safe query criteria
//!
//! A `Specification` describes what to read (filter, includes, ordering,
//! paging) independently of where the rows live; the `SpecificationEvaluator`
//! applies it to a collection in a fixed order.

mod builder;
mod criteria;
mod evaluator;
mod navigation;
mod ordering;

pub use builder::{DeletedFilter, Filter, Paging, Specification};
pub use criteria::Criteria;
pub use evaluator::SpecificationEvaluator;
pub use navigation::{Attach, Collection, Navigation, Reference, RowSource};
pub use ordering::{Direction, OrderBy, SortKey, SortMap};
