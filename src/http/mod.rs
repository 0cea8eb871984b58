//! The REST surface: routes, shared state, extractors and error rendering.
//!
//! | Method | Path | Cache TTL |
//! |---|---|---|
//! | GET | `/api/products?page&limit` | product list |
//! | GET | `/api/products/{id}` | product |
//! | GET | `/api/users/{id}` | user |
//! | DELETE | `/api/users/{id}` | invalidates |
//! | POST | `/api/customers/{id}/add-user` | invalidates |
//! | GET | `/api/customers/{id}/users?page&limit` | customer users |
//! | GET | `/api/customers/get-users?page&limit` | customer users |
//! | GET | `/health` | none |
//!
//! Every `/api` route requires HTTP Basic credentials.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod links;

use crate::auth::Authenticator;
use crate::backend::CacheBackend;
use crate::config::CacheTtls;
use crate::invalidation::Invalidator;
use crate::observability::AtomicMetrics;
use crate::repository::Store;
use crate::service::CacheService;
use crate::strategy::CacheStrategy;
use axum::routing::{get, post};
use axum::{middleware, Router};
use handlers::{customers, products, users};
use links::LinkBuilder;
use std::sync::Arc;

/// Everything a handler needs, cloned per request.
#[derive(Clone)]
pub struct AppState<S: Store, B: CacheBackend> {
    pub store: S,
    pub cache: CacheService<B>,
    pub invalidator: Invalidator<B>,
    pub authenticator: Authenticator,
    pub links: LinkBuilder,
    pub ttls: CacheTtls,
    pub metrics: Arc<AtomicMetrics>,
}

impl<S: Store, B: CacheBackend> AppState<S, B> {
    /// Wire the cache around `backend` with counting metrics, and the
    /// invalidator on the same cache.
    pub fn new(
        store: S,
        backend: B,
        strategy: CacheStrategy,
        authenticator: Authenticator,
        links: LinkBuilder,
        ttls: CacheTtls,
    ) -> Self {
        let metrics = Arc::new(AtomicMetrics::new());
        let cache = CacheService::with_metrics(backend, Box::new(Arc::clone(&metrics)))
            .with_strategy(strategy);
        let invalidator = Invalidator::new(cache.clone());

        AppState {
            store,
            cache,
            invalidator,
            authenticator,
            links,
            ttls,
            metrics,
        }
    }
}

/// Build the application router.
pub fn router<S: Store, B: CacheBackend>(state: AppState<S, B>) -> Router {
    Router::new()
        .route("/api/products", get(products::list_products::<S, B>))
        .route("/api/products/{id}", get(products::get_product::<S, B>))
        .route(
            "/api/users/{id}",
            get(users::get_user::<S, B>).delete(users::delete_user::<S, B>),
        )
        .route(
            "/api/customers/get-users",
            get(customers::list_own_users::<S, B>),
        )
        .route(
            "/api/customers/{id}/users",
            get(customers::list_customer_users::<S, B>),
        )
        .route(
            "/api/customers/{id}/add-user",
            post(customers::add_user::<S, B>),
        )
        .route("/health", get(handlers::health::<S, B>))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn(error::error_envelope))
        .with_state(state)
}
