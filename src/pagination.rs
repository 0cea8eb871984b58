//! Page window arithmetic and page links.
//!
//! [`paginate`] turns a total item count and a [`PageRequest`] into a
//! [`PageWindow`]: the offset to fetch from, the page count, and the
//! `self`/`first`/`last`/`previous`/`next` link set. It is pure; fetching the
//! page slice is the caller's job.
//!
//! ```
//! use catalog_api::pagination::{paginate, PageRequest};
//!
//! let window = paginate(25, PageRequest::new(3, 10));
//! assert_eq!(window.offset(), 20);
//! assert_eq!(window.total_pages(), 3);
//! assert!(window.has_previous());
//! assert!(!window.has_next());
//! ```

use crate::document::Links;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;

/// Requested page, with both fields guaranteed `>= 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Build a request, replacing values below 1 with the defaults.
    pub fn new(page: i64, limit: i64) -> Self {
        PageRequest {
            page: coerce(page, DEFAULT_PAGE),
            limit: coerce(limit, DEFAULT_LIMIT),
        }
    }

    /// Build a request from raw query-string values.
    ///
    /// Missing, non-numeric and non-positive values fall back to the
    /// defaults independently.
    pub fn from_query(page: Option<&str>, limit: Option<&str>) -> Self {
        let parse = |raw: Option<&str>| raw.and_then(|s| s.trim().parse::<i64>().ok());
        PageRequest {
            page: parse(page).map_or(DEFAULT_PAGE, |p| coerce(p, DEFAULT_PAGE)),
            limit: parse(limit).map_or(DEFAULT_LIMIT, |l| coerce(l, DEFAULT_LIMIT)),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Index of the first item of the requested page. Independent of the
    /// collection size, so the slice can be fetched alongside the count.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

fn coerce(value: i64, default: u32) -> u32 {
    if value < 1 {
        default
    } else {
        u32::try_from(value).unwrap_or(u32::MAX)
    }
}

/// Pagination metadata as serialized in list responses (`meta`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub current_page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

/// One page of a collection of `total_items` items.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageWindow {
    request: PageRequest,
    total_items: u64,
    total_pages: u64,
}

/// Compute the page window for `request` over `total_items` items.
pub fn paginate(total_items: u64, request: PageRequest) -> PageWindow {
    let limit = u64::from(request.limit);
    let total_pages = if total_items == 0 {
        0
    } else {
        total_items.div_ceil(limit)
    };

    PageWindow {
        request,
        total_items,
        total_pages,
    }
}

impl PageWindow {
    pub fn page(&self) -> u32 {
        self.request.page
    }

    pub fn limit(&self) -> u32 {
        self.request.limit
    }

    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    /// Index of the first item of this page.
    pub fn offset(&self) -> u64 {
        self.request.offset()
    }

    pub fn has_previous(&self) -> bool {
        self.request.page > 1
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.request.page) < self.total_pages
    }

    /// Page the `last` link points to. An empty collection still has a
    /// (empty) first page, so this never returns 0.
    pub fn last_page(&self) -> u64 {
        self.total_pages.max(1)
    }

    pub fn meta(&self) -> PageMeta {
        PageMeta {
            current_page: self.request.page,
            per_page: self.request.limit,
            total_items: self.total_items,
            total_pages: self.total_pages,
        }
    }

    /// Build the page link set; `url(page, limit)` renders one link.
    pub fn links<F>(&self, url: F) -> Links
    where
        F: Fn(u64, u32) -> String,
    {
        let page = u64::from(self.request.page);
        let limit = self.request.limit;

        let mut links = Links::new();
        links.insert("self".to_string(), url(page, limit));
        links.insert("first".to_string(), url(1, limit));
        links.insert("last".to_string(), url(self.last_page(), limit));
        if self.has_previous() {
            links.insert("previous".to_string(), url(page - 1, limit));
        }
        if self.has_next() {
            links.insert("next".to_string(), url(page + 1, limit));
        }
        links
    }
}
