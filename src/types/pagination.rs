//! Query parameters and paged results shared by specification reads.

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_PAGE_NUMBER, DEFAULT_PAGE_SIZE};

/// Caller-supplied search/sort/paging input used to build a `Specification`.
///
/// `page_index` is 1-based; `page_size` falls back to `DEFAULT_PAGE_SIZE`
/// when zero and is otherwise taken as given.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpecificationParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default = "default_page")]
    pub page_index: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

fn default_page() -> u64 {
    DEFAULT_PAGE_NUMBER
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

impl SpecificationParams {
    pub fn page(page_index: u64, page_size: u64) -> Self {
        Self {
            page_index,
            page_size,
            ..Self::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// 1-based page index, never below 1
    pub fn effective_page_index(&self) -> u64 {
        self.page_index.max(1)
    }

    /// Requested page size, `DEFAULT_PAGE_SIZE` when zero
    pub fn effective_page_size(&self) -> u64 {
        if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        }
    }

    /// Rows to skip for the requested page
    pub fn skip(&self) -> u64 {
        (self.effective_page_index() - 1).saturating_mul(self.effective_page_size())
    }

    /// Rows to take for the requested page
    pub fn take(&self) -> u64 {
        self.effective_page_size()
    }

    /// Trimmed, lower-cased search term; `None` when blank
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

impl Default for SpecificationParams {
    fn default() -> Self {
        Self {
            search: None,
            sort: None,
            page_index: DEFAULT_PAGE_NUMBER,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Paginated result wrapper
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Paginated<T> {
    /// Create new paginated result
    pub fn new(data: Vec<T>, page: u64, per_page: u64, total: u64) -> Self {
        let total_pages = if per_page > 0 {
            total.div_ceil(per_page)
        } else {
            0
        };

        Self {
            data,
            meta: PaginationMeta {
                page,
                per_page,
                total,
                total_pages,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_page_size_falls_back_to_default() {
        let params = SpecificationParams::page(3, 0);
        assert_eq!(params.take(), DEFAULT_PAGE_SIZE);
        assert_eq!(params.skip(), 2 * DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn page_index_is_one_based_and_clamped() {
        assert_eq!(SpecificationParams::page(0, 10).skip(), 0);
        assert_eq!(SpecificationParams::page(1, 10).skip(), 0);
        assert_eq!(SpecificationParams::page(2, 10).skip(), 10);
    }

    #[test]
    fn large_page_size_is_taken_as_given() {
        let params = SpecificationParams::page(3, 150);
        assert_eq!(params.take(), 150);
        assert_eq!(params.skip(), 300);
        assert_eq!(SpecificationParams::page(1, 10_000).take(), 10_000);
    }

    #[test]
    fn blank_search_is_ignored() {
        assert_eq!(SpecificationParams::default().with_search("   ").search_term(), None);
        assert_eq!(
            SpecificationParams::default().with_search(" HaMmer ").search_term().as_deref(),
            Some("hammer")
        );
    }

    #[test]
    fn deserializes_with_defaults() {
        let params: SpecificationParams = serde_json::from_str(r#"{"sort":"-name"}"#).unwrap();
        assert_eq!(params.page_index, DEFAULT_PAGE_NUMBER);
        assert_eq!(params.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(params.sort.as_deref(), Some("-name"));
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = Paginated::new(vec![1, 2, 3], 1, 10, 25);
        assert_eq!(page.meta.total_pages, 3);
    }
}
