//! Pagination and search parameters

use serde::{Deserialize, Serialize};

/// Maximum items per page
const MAX_PER_PAGE: u32 = 100;

/// Default items per page
const DEFAULT_PER_PAGE: u32 = 20;

/// Longest accepted search term
const MAX_SEARCH_LEN: usize = 100;

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Page number (1-indexed)
    pub page: u32,
    /// Items per page (max 100)
    pub per_page: u32,
}

impl Pagination {
    /// Create pagination with clamping.
    ///
    /// - Page is clamped to minimum of 1
    /// - Per page is clamped to 1..=100
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// SQL OFFSET value.
    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.per_page as u64
    }

    /// SQL LIMIT value.
    pub fn limit(&self) -> u32 {
        self.per_page
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Items for current page
    pub items: Vec<T>,
    /// Total count across all pages
    pub total: i64,
    /// Current page number
    pub page: u32,
    /// Items per page
    pub per_page: u32,
}

impl<T> Paginated<T> {
    /// An empty page.
    pub fn empty(page: Pagination) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: page.page,
            per_page: page.per_page,
        }
    }

    /// Convert the items, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }

    /// Total number of pages (at least 1).
    pub fn total_pages(&self) -> u32 {
        if self.total <= 0 {
            1
        } else {
            let per_page = self.per_page.max(1) as i64;
            ((self.total + per_page - 1) / per_page).max(1) as u32
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

/// Query parameters for pagination
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl From<PaginationParams> for Pagination {
    fn from(params: PaginationParams) -> Self {
        Self::new(
            params.page.unwrap_or(1),
            params.per_page.unwrap_or(DEFAULT_PER_PAGE),
        )
    }
}

/// Query parameters for searchable list endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Free-text search term
    pub q: Option<String>,
}

impl ListParams {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(
            self.page.unwrap_or(1),
            self.per_page.unwrap_or(DEFAULT_PER_PAGE),
        )
    }

    /// Search term, trimmed and capped; blank terms mean no search.
    pub fn search(&self) -> Option<String> {
        let q = self.q.as_deref()?.trim();
        if q.is_empty() {
            return None;
        }
        Some(q.chars().take(MAX_SEARCH_LEN).collect())
    }
}

/// Build an ILIKE pattern matching `term` anywhere, with wildcards escaped.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_calculation() {
        assert_eq!(Pagination::new(1, 10).offset(), 0);
        assert_eq!(Pagination::new(2, 10).offset(), 10);
        assert_eq!(Pagination::new(3, 25).offset(), 50);
    }

    #[test]
    fn clamps_page_and_per_page() {
        assert_eq!(Pagination::new(0, 10).page, 1);
        assert_eq!(Pagination::new(1, 0).per_page, 1);
        assert_eq!(Pagination::new(1, 999).per_page, 100);
    }

    #[test]
    fn defaults_from_empty_params() {
        let p = Pagination::from(PaginationParams::default());
        assert_eq!(p, Pagination::new(1, 20));
    }

    #[test]
    fn total_pages() {
        let mut paginated: Paginated<()> = Paginated::empty(Pagination::new(1, 10));
        assert_eq!(paginated.total_pages(), 1);

        paginated.total = 25;
        assert_eq!(paginated.total_pages(), 3);

        paginated.total = 100;
        assert_eq!(paginated.total_pages(), 10);
    }

    #[test]
    fn has_next_prev() {
        let mut paginated: Paginated<()> = Paginated {
            items: vec![],
            total: 30,
            page: 1,
            per_page: 10,
        };
        assert!(paginated.has_next());
        assert!(!paginated.has_prev());

        paginated.page = 3;
        assert!(!paginated.has_next());
        assert!(paginated.has_prev());
    }

    #[test]
    fn map_keeps_metadata() {
        let paginated = Paginated {
            items: vec![1, 2],
            total: 12,
            page: 2,
            per_page: 2,
        };
        let mapped = paginated.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20]);
        assert_eq!(mapped.total, 12);
        assert_eq!(mapped.page, 2);
    }

    #[test]
    fn blank_search_is_none() {
        let params = ListParams {
            q: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(params.search(), None);

        let params = ListParams {
            q: Some("  fintech ".into()),
            ..Default::default()
        };
        assert_eq!(params.search().as_deref(), Some("fintech"));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("solar"), "%solar%");
        assert_eq!(like_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
    }
}
