//! Absolute URLs for `_links`.
//!
//! Built from the configured public base URL rather than the request
//! `Host`, so cached documents are valid whichever host served them.

use crate::document::Links;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkBuilder {
    base_url: String,
}

impl LinkBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        LinkBuilder {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn products(&self) -> String {
        format!("{}/api/products", self.base_url)
    }

    pub fn products_page(&self, page: u64, limit: u32) -> String {
        format!("{}?page={}&limit={}", self.products(), page, limit)
    }

    pub fn product(&self, id: i64) -> String {
        format!("{}/api/products/{}", self.base_url, id)
    }

    pub fn user(&self, id: i64) -> String {
        format!("{}/api/users/{}", self.base_url, id)
    }

    pub fn customer_users(&self, customer_id: i64) -> String {
        format!("{}/api/customers/{}/users", self.base_url, customer_id)
    }

    pub fn customer_users_page(&self, customer_id: i64, page: u64, limit: u32) -> String {
        format!(
            "{}?page={}&limit={}",
            self.customer_users(customer_id),
            page,
            limit
        )
    }

    /// `self` and `collection` of a product.
    pub fn product_links(&self, id: i64) -> Links {
        Links::from([
            ("self".to_string(), self.product(id)),
            ("collection".to_string(), self.products()),
        ])
    }

    /// `self` and `customer_users` of a user; the latter only when the user
    /// belongs to a customer.
    pub fn user_links(&self, id: i64, customer_id: Option<i64>) -> Links {
        let mut links = Links::from([("self".to_string(), self.user(id))]);
        if let Some(customer_id) = customer_id {
            links.insert(
                "customer_users".to_string(),
                self.customer_users(customer_id),
            );
        }
        links
    }
}
