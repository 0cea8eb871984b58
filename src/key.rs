//! Cache keys and invalidation tags.
//!
//! Every key and tag string used by the API is produced here. Handlers
//! describe *what* they serve with an [`Endpoint`] and *what* they changed
//! with a [`Mutation`]; this module turns both into strings.
//!
//! | Endpoint | Key | Tags |
//! |---|---|---|
//! | product list | `products_page_<p>_limit_<l>` | `products`, `products_list` |
//! | product detail | `product_<id>` | `products`, `product_<id>` |
//! | user detail | `user_<id>` | `users`, `user_<id>`, `customer_<cid>_users` |
//! | customer users | `customer_<cid>_users_page_<p>_limit_<l>` | `users`, `customer_<cid>_users` |

use crate::pagination::PageRequest;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// A dependency label attached to cache entries.
///
/// Only constructible through the associated functions, so every tag in the
/// system matches one of the known patterns.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(String);

impl Tag {
    pub fn users() -> Self {
        Tag("users".to_string())
    }

    pub fn user(id: i64) -> Self {
        Tag(format!("user_{}", id))
    }

    pub fn customer_users(customer_id: i64) -> Self {
        Tag(format!("customer_{}_users", customer_id))
    }

    pub fn products() -> Self {
        Tag("products".to_string())
    }

    pub fn products_list() -> Self {
        Tag("products_list".to_string())
    }

    pub fn product(id: i64) -> Self {
        Tag(format!("product_{}", id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub type TagSet = BTreeSet<Tag>;

/// Build a composite key from literal segments and parameters.
fn composite(parts: &[&dyn fmt::Display]) -> String {
    parts
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("_")
}

/// A cacheable read endpoint together with its parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ProductList { page: PageRequest },
    ProductDetail { id: i64 },
    /// `customer_id` is the owning customer, if any; it only affects tags.
    UserDetail { id: i64, customer_id: Option<i64> },
    CustomerUsers { customer_id: i64, page: PageRequest },
}

impl Endpoint {
    pub fn cache_key(&self) -> String {
        match *self {
            Endpoint::ProductList { page } => composite(&[
                &"products_page",
                &page.page(),
                &"limit",
                &page.limit(),
            ]),
            Endpoint::ProductDetail { id } => composite(&[&"product", &id]),
            Endpoint::UserDetail { id, .. } => composite(&[&"user", &id]),
            Endpoint::CustomerUsers { customer_id, page } => composite(&[
                &"customer",
                &customer_id,
                &"users_page",
                &page.page(),
                &"limit",
                &page.limit(),
            ]),
        }
    }

    pub fn tags(&self) -> TagSet {
        match *self {
            Endpoint::ProductList { .. } => [Tag::products(), Tag::products_list()].into(),
            Endpoint::ProductDetail { id } => [Tag::products(), Tag::product(id)].into(),
            Endpoint::UserDetail { id, customer_id } => {
                let mut tags: TagSet = [Tag::users(), Tag::user(id)].into();
                if let Some(cid) = customer_id {
                    tags.insert(Tag::customer_users(cid));
                }
                tags
            }
            Endpoint::CustomerUsers { customer_id, .. } => {
                [Tag::users(), Tag::customer_users(customer_id)].into()
            }
        }
    }

    /// TTL used when configuration does not override it.
    pub fn default_ttl(&self) -> Duration {
        match self {
            Endpoint::ProductList { .. } => Duration::from_secs(3600),
            Endpoint::ProductDetail { .. } => Duration::from_secs(86400),
            Endpoint::UserDetail { .. } | Endpoint::CustomerUsers { .. } => {
                Duration::from_secs(60)
            }
        }
    }

    pub fn policy(&self, ttl: Duration) -> CachePolicy {
        CachePolicy {
            key: self.cache_key(),
            ttl,
            tags: self.tags(),
        }
    }
}

/// Everything the cache store needs to know to store one response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachePolicy {
    pub key: String,
    pub ttl: Duration,
    pub tags: TagSet,
}

/// A committed write whose cached reads must be evicted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
    UserAdded { customer_id: i64 },
    UserDeleted { id: i64, customer_id: Option<i64> },
}

impl Mutation {
    pub fn tags(&self) -> TagSet {
        match *self {
            Mutation::UserAdded { customer_id } => {
                [Tag::users(), Tag::customer_users(customer_id)].into()
            }
            Mutation::UserDeleted { id, customer_id } => {
                let mut tags: TagSet = [Tag::users(), Tag::user(id)].into();
                if let Some(cid) = customer_id {
                    tags.insert(Tag::customer_users(cid));
                }
                tags
            }
        }
    }
}
