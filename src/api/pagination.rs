use serde::Serialize;

pub(crate) const fn default_page() -> i64 {
    1
}

pub(crate) const fn default_per_page() -> i64 {
    20
}

/// Page/per_page normalized against the configured maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageRequest {
    pub(crate) page: i64,
    pub(crate) per_page: i64,
}

impl PageRequest {
    pub(crate) fn new(page: i64, per_page: i64, max_per_page: i64) -> Self {
        Self { page: page.max(1), per_page: per_page.clamp(1, max_per_page.max(1)) }
    }

    pub(crate) fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PaginatedResponse<T> {
    pub(crate) current_page: i64,
    pub(crate) data: Vec<T>,
    pub(crate) last_page: i64,
    pub(crate) total: i64,
    pub(crate) per_page: i64,
}

impl<T> PaginatedResponse<T> {
    pub(crate) fn new(data: Vec<T>, total: i64, page: PageRequest) -> Self {
        let last_page = ((total + page.per_page - 1) / page.per_page).max(1);
        Self { current_page: page.page, data, last_page, total, per_page: page.per_page }
    }
}
