use serde::Serialize;

/// Largest page size a listing accepts
const MAX_PAGE_SIZE: i64 = 100;

/// 1-based page request. Out-of-range sizes fall back to the endpoint
/// default rather than being clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, page_size: Option<i64>, default_size: i64) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let page_size = page_size
            .filter(|s| (1..=MAX_PAGE_SIZE).contains(s))
            .unwrap_or(default_size);
        Self { page, page_size }
    }

    /// Saturates for absurd page numbers; the query then returns no rows
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }
}

/// Optional filters applied to paginated listings
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub category: Option<String>,
    pub keyword: Option<String>,
}

impl ListFilter {
    /// `ILIKE` pattern for the keyword, with wildcards in the input escaped
    pub fn keyword_pattern(&self) -> Option<String> {
        self.keyword.as_deref().map(|k| {
            let escaped = k
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{}%", escaped)
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageResponse<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl<T: Serialize> PageResponse<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
            total_pages: (total + request.page_size - 1) / request.page_size,
        }
    }
}
