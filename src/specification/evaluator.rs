//! Applies a `Specification` to a logical collection of entities.
//!
//! Steps run in a fixed order: filter, includes, ordering, paging. Ordering
//! always ends with `id` ascending, so paging over an unordered
//! specification is still deterministic.

use std::cmp::Ordering;

use super::builder::Specification;
use super::navigation::Attach;
use crate::domain::Entity;
use crate::errors::AppResult;

/// Pure specification evaluation
pub struct SpecificationEvaluator;

impl SpecificationEvaluator {
    /// Run all four steps over `source`.
    pub fn evaluate<T, I>(
        spec: &Specification<T>,
        source: I,
        attachers: &[Attach<T>],
    ) -> AppResult<Vec<T>>
    where
        T: Entity,
        I: IntoIterator<Item = T>,
    {
        let filtered = Self::apply_filter(spec, source)?;
        Ok(Self::evaluate_filtered(spec, filtered, attachers))
    }

    /// Steps 2-4 over rows that already passed `apply_filter`.
    pub fn evaluate_filtered<T: Entity>(
        spec: &Specification<T>,
        mut rows: Vec<T>,
        attachers: &[Attach<T>],
    ) -> Vec<T> {
        Self::apply_includes(&mut rows, attachers);
        Self::apply_ordering(spec, &mut rows);
        Self::apply_paging(spec, rows)
    }

    /// Step 1: soft-delete visibility and the specification filter.
    ///
    /// A filter error fails the whole evaluation; rows are never dropped
    /// because they could not be checked.
    pub fn apply_filter<T, I>(spec: &Specification<T>, source: I) -> AppResult<Vec<T>>
    where
        T: Entity,
        I: IntoIterator<Item = T>,
    {
        let deleted = spec.deleted_filter();
        let mut kept = Vec::new();
        for item in source {
            if !deleted.admits(item.is_deleted()) {
                continue;
            }
            if let Some(filter) = spec.predicate() {
                if !filter.matches(&item)? {
                    continue;
                }
            }
            kept.push(item);
        }
        Ok(kept)
    }

    /// Step 2: attach prefetched navigations. No attachers, no-op.
    pub fn apply_includes<T>(rows: &mut [T], attachers: &[Attach<T>]) {
        for attach in attachers {
            rows.iter_mut().for_each(|row| attach(row));
        }
    }

    /// Step 3: stable multi-key sort with `id` ascending as final tie-breaker.
    pub fn apply_ordering<T: Entity>(spec: &Specification<T>, rows: &mut [T]) {
        rows.sort_by(|a, b| Self::compare(spec, a, b));
    }

    /// Step 4: skip/take window.
    pub fn apply_paging<T: Entity>(spec: &Specification<T>, rows: Vec<T>) -> Vec<T> {
        match spec.paging() {
            Some(paging) => rows
                .into_iter()
                .skip(usize::try_from(paging.skip).unwrap_or(usize::MAX))
                .take(usize::try_from(paging.take).unwrap_or(usize::MAX))
                .collect(),
            None => rows,
        }
    }

    /// Count of rows matching the filter; includes, ordering and paging are ignored.
    pub fn count<T, I>(spec: &Specification<T>, source: I) -> AppResult<u64>
    where
        T: Entity,
        I: IntoIterator<Item = T>,
    {
        Ok(Self::apply_filter(spec, source)?.len() as u64)
    }

    fn compare<T: Entity>(spec: &Specification<T>, a: &T, b: &T) -> Ordering {
        spec.orderings()
            .iter()
            .map(|rule| rule.compare(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.id().cmp(&b.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Metadata, SoftDelete};
    use crate::specification::Criteria;
    use crate::types::SpecificationParams;
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Item {
        id: Uuid,
        name: String,
        rank: i64,
        #[serde(flatten)]
        metadata: Metadata,
        #[serde(flatten)]
        deletion: SoftDelete,
    }

    impl Entity for Item {
        const TABLE_NAME: &'static str = "Item";

        fn id(&self) -> Uuid {
            self.id
        }
        fn set_id(&mut self, id: Uuid) {
            self.id = id;
        }
        fn metadata(&self) -> &Metadata {
            &self.metadata
        }
        fn metadata_mut(&mut self) -> &mut Metadata {
            &mut self.metadata
        }
        fn soft_delete(&self) -> Option<&SoftDelete> {
            Some(&self.deletion)
        }
        fn soft_delete_mut(&mut self) -> Option<&mut SoftDelete> {
            Some(&mut self.deletion)
        }
    }

    fn items(n: u128) -> Vec<Item> {
        (1..=n)
            .map(|i| Item {
                id: Uuid::from_u128(i),
                name: format!("item-{i:02}"),
                rank: (i % 3) as i64,
                metadata: Metadata::default(),
                deletion: SoftDelete::default(),
            })
            .collect()
    }

    fn ids(rows: &[Item]) -> Vec<u128> {
        rows.iter().map(|r| r.id.as_u128()).collect()
    }

    #[test]
    fn no_filter_matches_everything_in_id_order() {
        let mut source = items(5);
        source.reverse();
        let rows = SpecificationEvaluator::evaluate(&Specification::new(), source, &[]).unwrap();
        assert_eq!(ids(&rows), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn ordering_happens_before_paging() {
        let spec = Specification::<Item>::new()
            .order_by_descending(|i| i.id)
            .page(0, 2);
        let rows = SpecificationEvaluator::evaluate(&spec, items(5), &[]).unwrap();
        assert_eq!(ids(&rows), vec![5, 4]);
    }

    #[test]
    fn multi_key_ordering_breaks_ties_with_later_keys_then_id() {
        let spec = Specification::<Item>::new()
            .order_by(|i| i.rank)
            .order_by_descending(|i| i.name.clone());
        let rows = SpecificationEvaluator::evaluate(&spec, items(6), &[]).unwrap();
        assert_eq!(ids(&rows), vec![6, 3, 4, 1, 5, 2]);
    }

    #[test]
    fn pages_partition_the_ordered_set() {
        let full = SpecificationEvaluator::evaluate(
            &Specification::<Item>::new().order_by(|i| i.rank),
            items(23),
            &[],
        ).unwrap();
        let mut stitched = Vec::new();
        for page in 1..=3 {
            let spec = Specification::<Item>::new()
                .order_by(|i| i.rank)
                .paginate(&SpecificationParams::page(page, 10));
            let rows = SpecificationEvaluator::evaluate(&spec, items(23), &[]).unwrap();
            assert!(rows.len() <= 10);
            stitched.extend(rows);
        }
        assert_eq!(ids(&stitched), ids(&full));
    }

    #[test]
    fn count_ignores_paging() {
        let spec = Specification::<Item>::new()
            .criteria(Criteria::eq("rank", 0))
            .page(0, 1);
        assert_eq!(SpecificationEvaluator::count(&spec, items(9)).unwrap(), 3);
    }

    #[test]
    fn soft_deleted_rows_hidden_unless_requested() {
        let mut source = items(3);
        source[1].deletion.is_deleted = true;
        let visible = SpecificationEvaluator::evaluate(&Specification::new(), source.clone(), &[]).unwrap();
        assert_eq!(ids(&visible), vec![1, 3]);
        let deleted = SpecificationEvaluator::evaluate(
            &Specification::<Item>::new().only_deleted(),
            source.clone(),
            &[],
        ).unwrap();
        assert_eq!(ids(&deleted), vec![2]);
        let all = SpecificationEvaluator::evaluate(&Specification::<Item>::new().with_deleted(), source, &[]).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn includes_run_before_ordering() {
        let attach: Attach<Item> = Box::new(|item: &mut Item| item.rank = -(item.id.as_u128() as i64));
        let spec = Specification::<Item>::new().order_by(|i| i.rank);
        let rows = SpecificationEvaluator::evaluate(&spec, items(3), &[attach]).unwrap();
        assert_eq!(ids(&rows), vec![3, 2, 1]);
    }

    #[test]
    fn invalid_criteria_fail_instead_of_dropping_rows() {
        let bad = std::collections::HashMap::from([((1, 2), 3)]);
        let spec = Specification::<Item>::new().criteria(Criteria::eq("rank", bad));
        assert!(matches!(
            SpecificationEvaluator::evaluate(&spec, items(3), &[]),
            Err(crate::errors::AppError::Validation(_))
        ));
        assert!(SpecificationEvaluator::count(&spec, items(3)).is_err());
        assert_eq!(SpecificationEvaluator::count(&spec, Vec::new()).unwrap(), 0);
    }

    #[test]
    fn paging_past_the_end_is_empty() {
        let spec = Specification::<Item>::new().page(50, 10);
        assert!(SpecificationEvaluator::evaluate(&spec, items(5), &[]).unwrap().is_empty());
    }
}
