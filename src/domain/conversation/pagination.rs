//! 1-indexed page arithmetic for history queries.

use serde::Serialize;

/// Page used when the client does not ask for one.
pub const DEFAULT_PAGE: i64 = 1;

/// Page size used when the client does not ask for one.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    current_page: i64,
    page_size: i64,
}

impl PageRequest {
    /// Builds a request, replacing missing or non-positive values with
    /// the defaults.
    pub fn new(current_page: Option<i64>, page_size: Option<i64>) -> Self {
        Self {
            current_page: current_page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE),
            page_size: page_size.filter(|s| *s > 0).unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }

    pub fn current_page(&self) -> i64 {
        self.current_page
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    /// Rows to skip.
    pub fn offset(&self) -> i64 {
        (self.current_page - 1).saturating_mul(self.page_size)
    }

    /// `ceil(total_count / page_size)`.
    pub fn total_pages(&self, total_count: i64) -> i64 {
        if total_count <= 0 {
            return 0;
        }
        total_count / self.page_size + i64::from(total_count % self.page_size != 0)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the totals needed to render pagination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: i64,
    pub total_page: i64,
    pub current_page: i64,
    pub page_size: i64,
}

impl<T> Page<T> {
    /// Assembles a page from the rows of `request` and the full count.
    pub fn new(items: Vec<T>, total_count: i64, request: PageRequest) -> Self {
        Self {
            items,
            total_count,
            total_page: request.total_pages(total_count),
            current_page: request.current_page(),
            page_size: request.page_size(),
        }
    }

    /// Empty page for conversations that do not exist for the caller.
    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), 0, request)
    }

    /// Transforms every item, keeping the totals.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            total_page: self.total_page,
            current_page: self.current_page,
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults_apply_to_missing_values() {
        let page = PageRequest::new(None, None);
        assert_eq!(page.current_page(), 1);
        assert_eq!(page.page_size(), 10);
    }

    #[test]
    fn non_positive_values_reset_to_defaults() {
        let page = PageRequest::new(Some(0), Some(-5));
        assert_eq!(page.current_page(), 1);
        assert_eq!(page.page_size(), 10);
    }

    #[test]
    fn offset_is_zero_based() {
        assert_eq!(PageRequest::new(Some(1), Some(10)).offset(), 0);
        assert_eq!(PageRequest::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = PageRequest::new(Some(1), Some(10));
        assert_eq!(page.total_pages(0), 0);
        assert_eq!(page.total_pages(1), 1);
        assert_eq!(page.total_pages(10), 1);
        assert_eq!(page.total_pages(11), 2);
    }

    #[test]
    fn total_pages_does_not_overflow_near_max() {
        let page = PageRequest::new(Some(1), Some(10));
        assert_eq!(page.total_pages(i64::MAX), i64::MAX / 10 + 1);

        let single = PageRequest::new(Some(1), Some(1));
        assert_eq!(single.total_pages(i64::MAX), i64::MAX);

        let large = PageRequest::new(Some(1), Some(i64::MAX));
        assert_eq!(large.total_pages(i64::MAX), 1);
        assert_eq!(large.total_pages(i64::MAX - 1), 1);
    }

    #[test]
    fn map_keeps_totals() {
        let page = Page::new(vec![1, 2], 12, PageRequest::new(Some(2), Some(2)));
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20]);
        assert_eq!(mapped.total_page, 6);
        assert_eq!(mapped.current_page, 2);
    }

    proptest! {
        #[test]
        fn total_pages_is_ceiling_division(count in 0i64..10_000, size in 1i64..500) {
            let page = PageRequest::new(Some(1), Some(size));
            let expected = (count as f64 / size as f64).ceil() as i64;
            prop_assert_eq!(page.total_pages(count), expected);
        }

        #[test]
        fn total_pages_matches_wide_arithmetic(count in 0i64..=i64::MAX, size in 1i64..=i64::MAX) {
            let page = PageRequest::new(Some(1), Some(size));
            let expected = (i128::from(count) + i128::from(size) - 1) / i128::from(size);
            prop_assert_eq!(i128::from(page.total_pages(count)), expected);
        }

        #[test]
        fn pages_past_the_end_start_beyond_the_count(count in 0i64..1_000, size in 1i64..50) {
            let first = PageRequest::new(Some(1), Some(size));
            let beyond = PageRequest::new(Some(first.total_pages(count) + 1), Some(size));
            prop_assert!(beyond.offset() >= count);
        }
    }
}
