//! Offset-based pagination types.
//!
//! The registry and history store both page by `(page, limit)` rather than
//! cursor, matching the contract in the data model: `query({page, limit, ...})`.

use serde::Serialize;

/// Default page size when the caller does not specify one.
pub const DEFAULT_LIMIT: i64 = 20;

/// Maximum page size a caller may request.
pub const MAX_LIMIT: i64 = 200;

/// Page number and size, clamped to sane bounds.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Builds a page request, clamping `page` to at least 1 and `limit` to
    /// `[1, MAX_LIMIT]`.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        Self { page, limit }
    }

    /// Row offset for this page, for use in a `LIMIT/OFFSET` query.
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// A page of results plus the total row count across all pages.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        Self {
            items,
            page: request.page,
            limit: request.limit,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults() {
        let req = PageRequest::new(None, None);
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, DEFAULT_LIMIT);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_page_request_offset() {
        let req = PageRequest::new(Some(3), Some(10));
        assert_eq!(req.offset(), 20);
    }

    #[test]
    fn test_page_request_clamps_limit() {
        let req = PageRequest::new(Some(1), Some(10_000));
        assert_eq!(req.limit, MAX_LIMIT);
    }

    #[test]
    fn test_page_request_rejects_zero_page() {
        let req = PageRequest::new(Some(0), Some(10));
        assert_eq!(req.page, 1);
    }

    #[test]
    fn test_page_wraps_items() {
        let req = PageRequest::new(Some(2), Some(5));
        let page = Page::new(vec![1, 2, 3], req, 13);
        assert_eq!(page.items, vec![1, 2, 3]);
        assert_eq!(page.page, 2);
        assert_eq!(page.limit, 5);
        assert_eq!(page.total, 13);
    }
}
