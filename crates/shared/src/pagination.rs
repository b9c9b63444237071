//! Page/offset pagination utilities.

use serde::{Deserialize, Serialize};

/// Default page size for listings.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Upper bound for the page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A normalized, 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Builds a page request from raw caller input.
    ///
    /// Pages below 1 are treated as page 1 and the limit is clamped
    /// to `1..=MAX_PAGE_SIZE`.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }

    /// Page size as a SQL friendly integer.
    pub fn limit_i64(&self) -> i64 {
        self.limit as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Number of pages needed to show `total` rows, `ceil(total / limit)`.
pub fn total_pages(total: i64, limit: u32) -> i64 {
    if total <= 0 || limit == 0 {
        return 0;
    }
    let limit = limit as i64;
    (total + limit - 1) / limit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let page = PageRequest::default();
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_page_zero_is_first_page() {
        let page = PageRequest::new(Some(0), Some(10));
        assert_eq!(page.page, 1);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(PageRequest::new(None, Some(0)).limit, 1);
        assert_eq!(PageRequest::new(None, Some(5000)).limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_offset() {
        let page = PageRequest::new(Some(3), Some(20));
        assert_eq!(page.offset(), 40);
        assert_eq!(page.limit_i64(), 20);
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 25), 0);
        assert_eq!(total_pages(1, 25), 1);
        assert_eq!(total_pages(25, 25), 1);
        assert_eq!(total_pages(26, 25), 2);
        assert_eq!(total_pages(101, 10), 11);
    }
}
