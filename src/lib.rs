//! # catalog-api
//!
//! A REST API over customers, their users and a product catalogue, with a
//! tag-aware response cache and conditional GET in front of the data store.
//!
//! ## Features
//!
//! - **Pagination:** `page`/`limit` windows with `self`/`first`/`last`/
//!   `previous`/`next` links ([`pagination`])
//! - **Derived cache keys and tags:** one place maps endpoints and writes to
//!   keys and tags ([`key`])
//! - **Tag-aware cache store:** get-or-compute with TTL, tag invalidation,
//!   in-memory or Redis backends ([`backend`], [`CacheService`])
//! - **Conditional responses:** strong ETags over the response bytes, 304 on
//!   a matching `If-None-Match` ([`conditional`])
//! - **Write-path invalidation:** mutations evict exactly the reads they
//!   affect ([`invalidation`])
//!
//! ## Quick Start
//!
//! ```
//! use catalog_api::backend::InMemoryBackend;
//! use catalog_api::document::{Document, Links};
//! use catalog_api::key::Endpoint;
//! use catalog_api::CacheService;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> catalog_api::Result<()> {
//! let cache = CacheService::new(InMemoryBackend::new());
//! let policy = Endpoint::ProductDetail { id: 42 }.policy(Duration::from_secs(60));
//!
//! let document: Document<String> = cache
//!     .get_or_compute(&policy, || async {
//!         Ok::<_, catalog_api::Error>(Document::new("Phone".to_string(), Links::new()))
//!     })
//!     .await?;
//! assert_eq!(document.data, "Phone");
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod auth;
pub mod backend;
pub mod conditional;
pub mod config;
pub mod document;
pub mod error;
pub mod expander;
pub mod fixtures;
pub mod http;
pub mod invalidation;
pub mod key;
pub mod models;
pub mod observability;
pub mod pagination;
pub mod payload;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod repository;
pub mod serialization;
pub mod service;
pub mod strategy;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use error::{Error, Result};
pub use expander::CacheExpander;
pub use payload::CachePayload;
pub use service::CacheService;
pub use strategy::CacheStrategy;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
