use serde::{Deserialize, Serialize};
use chrono::{DateTime, SecondsFormat, Utc};

/// Fixed page size used by the household list.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Pagination parameters (1-based pages)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationParams {
    pub page: u32,
    pub per_page: u32,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PaginationParams {
    pub fn page(page: u32) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    /// Page 0 is read as page 1 and a zero page size as the default size.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: if self.per_page == 0 { DEFAULT_PAGE_SIZE } else { self.per_page },
        }
    }

    pub fn offset(&self) -> usize {
        let p = self.normalized();
        (p.page as usize - 1) * p.per_page as usize
    }
}

/// Paginated result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total: u64, params: PaginationParams) -> Self {
        let params = params.normalized();
        let total_pages = ((total + params.per_page as u64 - 1) / params.per_page as u64) as u32;
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
            total_pages,
        }
    }

    /// Slice one page out of an already ordered list. Pages past the end are empty.
    pub fn from_sorted(all: Vec<T>, params: PaginationParams) -> Self {
        let params = params.normalized();
        let total = all.len() as u64;
        let items: Vec<T> = all
            .into_iter()
            .skip(params.offset())
            .take(params.per_page as usize)
            .collect();
        Self::new(items, total, params)
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
