use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Raw `?page=&limit=` query parameters as sent by clients.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Normalized pagination window: page >= 1, 1 <= limit <= MAX_PAGE_SIZE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    /// Query structs with extra filters carry `page`/`limit` inline
    /// (`serde(flatten)` breaks numeric query parsing) and build the window here.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Page {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }

    pub fn limit(&self) -> i64 {
        self.limit as i64
    }
}

impl From<&PageParams> for Page {
    fn from(params: &PageParams) -> Self {
        Page::new(params.page, params.limit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: Page) -> Self {
        let total = total.max(0);
        let total_pages = ((total + page.limit as i64 - 1) / page.limit as i64) as u32;
        Self {
            items,
            total,
            page: page.page,
            limit: page.limit,
            total_pages,
        }
    }
}
