//! Immutable query specification with a consuming fluent builder.

use std::fmt;
use std::sync::Arc;

use super::criteria::Criteria;
use super::navigation::Navigation;
use super::ordering::{Direction, OrderBy, SortKey, SortMap};
use crate::errors::AppResult;
use crate::types::SpecificationParams;

/// Row filter: an opaque predicate, inspectable criteria, or a conjunction.
pub enum Filter<T> {
    Predicate(Arc<dyn Fn(&T) -> bool + Send + Sync>),
    Criteria(Criteria),
    All(Vec<Filter<T>>),
}

impl<T: serde::Serialize> Filter<T> {
    /// Whether `item` passes. A row that cannot be projected to JSON for
    /// criteria, or criteria holding an invalid value, is an error.
    pub fn matches(&self, item: &T) -> AppResult<bool> {
        match self {
            Filter::Predicate(pred) => Ok(pred(item)),
            Filter::Criteria(criteria) => criteria.matches(&serde_json::to_value(item)?),
            Filter::All(filters) => {
                for filter in filters {
                    if !filter.matches(item)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

impl<T> Clone for Filter<T> {
    fn clone(&self) -> Self {
        match self {
            Filter::Predicate(pred) => Filter::Predicate(Arc::clone(pred)),
            Filter::Criteria(criteria) => Filter::Criteria(criteria.clone()),
            Filter::All(filters) => Filter::All(filters.clone()),
        }
    }
}

impl<T> fmt::Debug for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Predicate(_) => f.write_str("Predicate(..)"),
            Filter::Criteria(criteria) => f.debug_tuple("Criteria").field(criteria).finish(),
            Filter::All(filters) => f.debug_tuple("All").field(filters).finish(),
        }
    }
}

/// Soft-delete visibility of a specification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletedFilter {
    #[default]
    Exclude,
    Include,
    Only,
}

impl DeletedFilter {
    pub fn admits(&self, is_deleted: bool) -> bool {
        match self {
            DeletedFilter::Exclude => !is_deleted,
            DeletedFilter::Include => true,
            DeletedFilter::Only => is_deleted,
        }
    }
}

/// Paging window; skip and take only exist together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub skip: u64,
    pub take: u64,
}

/// Reusable query description: filter, includes, ordering and paging.
///
/// Ordering is multi-key: the first `order_by*` call is the primary sort and
/// each later call adds a tie-breaker. Evaluation always ends with `id`
/// ascending so pages are stable.
pub struct Specification<T: Send + Sync + 'static> {
    filter: Option<Filter<T>>,
    includes: Vec<Arc<dyn Navigation<T>>>,
    orderings: Vec<OrderBy<T>>,
    paging: Option<Paging>,
    deleted: DeletedFilter,
}

impl<T: Send + Sync + 'static> Specification<T> {
    /// Specification matching every visible row.
    pub fn new() -> Self {
        Self {
            filter: None,
            includes: Vec::new(),
            orderings: Vec::new(),
            paging: None,
            deleted: DeletedFilter::Exclude,
        }
    }

    /// Set the base predicate (replaces any previous filter).
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Filter::Predicate(Arc::new(predicate)));
        self
    }

    /// Set the base criteria (replaces any previous filter).
    pub fn criteria(mut self, criteria: Criteria) -> Self {
        self.filter = Some(Filter::Criteria(criteria));
        self
    }

    /// Narrow the current filter with an additional predicate.
    pub fn and_filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.narrow(Filter::Predicate(Arc::new(predicate)))
    }

    /// Narrow the current filter with additional criteria.
    pub fn and_criteria(self, criteria: Criteria) -> Self {
        self.narrow(Filter::Criteria(criteria))
    }

    fn narrow(mut self, extra: Filter<T>) -> Self {
        self.filter = Some(match self.filter.take() {
            None => extra,
            Some(Filter::All(mut filters)) => {
                filters.push(extra);
                Filter::All(filters)
            }
            Some(existing) => Filter::All(vec![existing, extra]),
        });
        self
    }

    /// Eager-load a navigation. Duplicates are kept.
    pub fn include<N>(mut self, navigation: N) -> Self
    where
        N: Navigation<T> + 'static,
    {
        self.includes.push(Arc::new(navigation));
        self
    }

    pub fn order_by<K, F>(mut self, key: F) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
        K: Into<SortKey>,
    {
        self.orderings.push(OrderBy::new(key, Direction::Ascending));
        self
    }

    pub fn order_by_descending<K, F>(mut self, key: F) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
        K: Into<SortKey>,
    {
        self.orderings.push(OrderBy::new(key, Direction::Descending));
        self
    }

    /// Apply the page described by `params`.
    pub fn paginate(self, params: &SpecificationParams) -> Self {
        self.page(params.skip(), params.take())
    }

    /// Set the paging window directly. A second call replaces the first.
    pub fn page(mut self, skip: u64, take: u64) -> Self {
        if let Some(previous) = self.paging {
            tracing::warn!(?previous, skip, take, "Paging applied twice, keeping the latest window");
        }
        self.paging = Some(Paging { skip, take });
        self
    }

    /// Include soft-deleted rows.
    pub fn with_deleted(mut self) -> Self {
        self.deleted = DeletedFilter::Include;
        self
    }

    /// Select only soft-deleted rows.
    pub fn only_deleted(mut self) -> Self {
        self.deleted = DeletedFilter::Only;
        self
    }

    /// AND a case-insensitive search over `columns` when `params` carries a term.
    pub fn search(self, params: &SpecificationParams, columns: &[&str]) -> Self {
        let Some(term) = params.search_term() else {
            return self;
        };
        let matches_any = columns
            .iter()
            .map(|column| Criteria::contains(*column, term.as_str()))
            .reduce(Criteria::or);
        match matches_any {
            Some(criteria) => self.and_criteria(criteria),
            None => self,
        }
    }

    /// Apply `params.sort` through `sorts`; unknown keys are ignored.
    pub fn sort(mut self, params: &SpecificationParams, sorts: &SortMap<T>) -> Self {
        if let Some(rule) = params.sort.as_deref().and_then(|s| sorts.resolve(s)) {
            self.orderings.push(rule);
        } else if let Some(sort) = params.sort.as_deref() {
            tracing::debug!(sort, "Ignoring unknown sort key");
        }
        self
    }

    pub fn predicate(&self) -> Option<&Filter<T>> {
        self.filter.as_ref()
    }

    pub fn includes(&self) -> &[Arc<dyn Navigation<T>>] {
        &self.includes
    }

    pub fn include_paths(&self) -> Vec<&str> {
        self.includes.iter().map(|n| n.path()).collect()
    }

    pub fn orderings(&self) -> &[OrderBy<T>] {
        &self.orderings
    }

    pub fn paging(&self) -> Option<Paging> {
        self.paging
    }

    pub fn deleted_filter(&self) -> DeletedFilter {
        self.deleted
    }

    /// Copy of this specification without paging (used for totals).
    pub fn without_paging(&self) -> Self {
        let mut spec = self.clone();
        spec.paging = None;
        spec
    }
}

impl<T: Send + Sync + 'static> Default for Specification<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> Clone for Specification<T> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            includes: self.includes.clone(),
            orderings: self.orderings.clone(),
            paging: self.paging,
            deleted: self.deleted,
        }
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for Specification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Specification")
            .field("filter", &self.filter)
            .field("includes", &self.include_paths())
            .field("orderings", &self.orderings.len())
            .field("paging", &self.paging)
            .field("deleted", &self.deleted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_orderings_append_as_tie_breakers() {
        let spec = Specification::<(i64, i64)>::new()
            .order_by(|p| p.0)
            .order_by_descending(|p| p.1);
        let directions: Vec<_> = spec.orderings().iter().map(|o| o.direction()).collect();
        assert_eq!(directions, vec![Direction::Ascending, Direction::Descending]);
    }

    #[test]
    fn paginate_computes_window_and_second_call_replaces() {
        let spec = Specification::<i64>::new()
            .paginate(&SpecificationParams::page(2, 10))
            .page(0, 5);
        assert_eq!(spec.paging(), Some(Paging { skip: 0, take: 5 }));
    }

    #[test]
    fn search_without_term_keeps_filter_empty() {
        let spec = Specification::<i64>::new().search(&SpecificationParams::default(), &["name"]);
        assert!(spec.predicate().is_none());
    }

    #[test]
    fn search_narrows_existing_filter() {
        let params = SpecificationParams::default().with_search("ham");
        let spec = Specification::<i64>::new()
            .filter(|n| *n > 0)
            .search(&params, &["name", "description"]);
        assert!(matches!(spec.predicate(), Some(Filter::All(parts)) if parts.len() == 2));
    }

    #[test]
    fn row_that_cannot_be_projected_fails_criteria() {
        use crate::errors::AppError;
        use std::collections::HashMap;

        let row: HashMap<(i32, i32), i32> = HashMap::from([((1, 2), 3)]);
        let by_criteria = Filter::Criteria(Criteria::is_null("name"));
        assert!(matches!(by_criteria.matches(&row), Err(AppError::Serialization(_))));

        let by_predicate: Filter<HashMap<(i32, i32), i32>> = Filter::Predicate(Arc::new(|_| true));
        assert!(by_predicate.matches(&row).unwrap());
    }

    #[test]
    fn deleted_visibility() {
        assert!(DeletedFilter::Exclude.admits(false));
        assert!(!DeletedFilter::Exclude.admits(true));
        assert!(DeletedFilter::Include.admits(true));
        assert!(!DeletedFilter::Only.admits(false));
    }
}
