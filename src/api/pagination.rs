//! Pagination utilities for list endpoints

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Pagination query parameters
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PaginationParams {
    /// Page number (1-indexed)
    pub page: Option<u32>,

    pub per_page: Option<u32>,
}

impl PaginationParams {
    pub const MAX_PER_PAGE: u32 = 100;
    pub const DEFAULT_PER_PAGE: u32 = 20;

    pub fn with_default_per_page(mut self, per_page: u32) -> Self {
        self.per_page.get_or_insert(per_page);
        self
    }

    /// Clamped to `1..=MAX_PER_PAGE`
    pub fn per_page(&self) -> u32 {
        self.per_page
            .unwrap_or(Self::DEFAULT_PER_PAGE)
            .clamp(1, Self::MAX_PER_PAGE)
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * i64::from(self.per_page())
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page())
    }

    /// The current page of an in-memory result set.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = (self.offset() as usize).min(items.len());
        let end = (start + self.per_page() as usize).min(items.len());
        &items[start..end]
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    pub fn new(params: &PaginationParams, total_items: u64) -> Self {
        let per_page = params.per_page();
        let page = params.page();
        let total_pages = total_items.div_ceil(u64::from(per_page)) as u32;

        Self {
            page,
            per_page,
            total_items,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// Paginated response wrapper
#[derive(Debug, Serialize)]
pub struct Paginated<T: Serialize> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(data: Vec<T>, params: &PaginationParams, total_items: u64) -> Self {
        Self {
            data,
            pagination: PaginationMeta::new(params, total_items),
        }
    }
}

impl<T: Serialize> IntoResponse for Paginated<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn params(page: Option<u32>, per_page: Option<u32>) -> PaginationParams {
        PaginationParams { page, per_page }
    }

    #[rstest]
    #[case(None, None, 1, 20)]
    #[case(Some(0), Some(0), 1, 1)]
    #[case(Some(3), Some(500), 3, 100)]
    fn clamps_inputs(
        #[case] page: Option<u32>,
        #[case] per_page: Option<u32>,
        #[case] expected_page: u32,
        #[case] expected_per_page: u32,
    ) {
        let p = params(page, per_page);
        assert_eq!(p.page(), expected_page);
        assert_eq!(p.per_page(), expected_per_page);
    }

    #[test]
    fn slices_in_memory_pages() {
        let items: Vec<u32> = (1..=25).collect();
        assert_eq!(params(Some(2), Some(10)).slice(&items), &[11, 12, 13, 14, 15, 16, 17, 18, 19, 20]);
        assert_eq!(params(Some(3), Some(10)).slice(&items), &[21, 22, 23, 24, 25]);
        assert!(params(Some(9), Some(10)).slice(&items).is_empty());
    }

    #[test]
    fn meta_counts_partial_last_page() {
        let meta = PaginationMeta::new(&params(Some(3), Some(10)), 25);
        assert_eq!(meta.total_pages, 3);
        assert!(!meta.has_next);
        assert!(meta.has_prev);

        let empty = PaginationMeta::new(&params(None, None), 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
    }

    #[test]
    fn route_default_applies_only_when_unset() {
        assert_eq!(params(None, None).with_default_per_page(10).per_page(), 10);
        assert_eq!(params(None, Some(5)).with_default_per_page(10).per_page(), 5);
    }
}
