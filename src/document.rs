//! Response documents: what handlers serialize and what the cache stores.
//!
//! Both shapes avoid optional fields so they round-trip through the
//! Postcard cache envelope unchanged; absent links are simply missing
//! keys of the link map.

use crate::pagination::{PageMeta, PageWindow};
use crate::payload::CachePayload;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Link relation name to absolute URL, serialized in key order.
pub type Links = BTreeMap<String, String>;

/// Detail response: `{ "data": ..., "_links": {...} }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document<T> {
    pub data: T,
    #[serde(rename = "_links")]
    pub links: Links,
}

impl<T> Document<T> {
    pub fn new(data: T, links: Links) -> Self {
        Document { data, links }
    }
}

/// List response: `{ "data": [...], "meta": {...}, "_links": {...} }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PagedDocument<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
    #[serde(rename = "_links")]
    pub links: Links,
}

impl<T> PagedDocument<T> {
    /// Assemble a page from its items and window; `url(page, limit)`
    /// renders each page link.
    pub fn from_window<F>(data: Vec<T>, window: &PageWindow, url: F) -> Self
    where
        F: Fn(u64, u32) -> String,
    {
        PagedDocument {
            data,
            meta: window.meta(),
            links: window.links(url),
        }
    }
}

impl<T> CachePayload for Document<T> where
    T: Send + Sync + Serialize + DeserializeOwned + Clone + 'static
{
}

impl<T> CachePayload for PagedDocument<T>
where
    T: Send + Sync + Serialize + DeserializeOwned + Clone + 'static,
{
    fn validate(&self) -> crate::error::Result<()> {
        if self.data.len() as u64 > u64::from(self.meta.per_page) {
            return Err(crate::error::Error::InvalidCacheEntry(format!(
                "page holds {} items, limit is {}",
                self.data.len(),
                self.meta.per_page
            )));
        }
        Ok(())
    }
}
