//! Fixed-size page slicing for post feeds.
//!
//! Page numbers are 1-based. Anything that is not a number falls back to the
//! first page and out-of-range numbers clamp to the nearest existing page, so
//! resolving a page never fails.

use serde::Serialize;

/// Query string accepted by every paginated route (`?page=2`).
///
/// The raw value is kept as a string so that `?page=abc` still extracts.
#[derive(Debug, Default)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    /// Reads `page` out of a raw query string. A repeated parameter keeps
    /// its last value and unrelated parameters are ignored.
    pub fn from_query(query: Option<&str>) -> Self {
        let page = query.and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .filter(|(key, _)| key == "page")
                .map(|(_, value)| value.into_owned())
                .last()
        });
        Self { page }
    }

    pub fn number(&self) -> i64 {
        parse_page_number(self.page.as_deref())
    }
}

pub fn parse_page_number(raw: Option<&str>) -> i64 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    count: i64,
    per_page: i64,
}

/// The rows a page covers, ready to bind as `LIMIT` / `OFFSET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: i64,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub per_page: i64,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<i64>,
    pub previous_page_number: Option<i64>,
    pub items: Vec<T>,
}

impl Paginator {
    pub fn new(count: i64, per_page: i64) -> Self {
        Self {
            count: count.max(0),
            per_page: per_page.max(1),
        }
    }

    /// An empty collection still has one (empty) page.
    pub fn num_pages(&self) -> i64 {
        if self.count == 0 {
            1
        } else {
            (self.count + self.per_page - 1) / self.per_page
        }
    }

    pub fn window(&self, requested: i64) -> PageWindow {
        let number = requested.clamp(1, self.num_pages());
        PageWindow {
            number,
            offset: (number - 1) * self.per_page,
            limit: self.per_page,
        }
    }

    pub fn page<T>(&self, window: PageWindow, items: Vec<T>) -> Page<T> {
        let num_pages = self.num_pages();
        let has_next = window.number < num_pages;
        let has_previous = window.number > 1;
        Page {
            number: window.number,
            num_pages,
            count: self.count,
            per_page: self.per_page,
            has_next,
            has_previous,
            next_page_number: has_next.then(|| window.number + 1),
            previous_page_number: has_previous.then(|| window.number - 1),
            items,
        }
    }
}
