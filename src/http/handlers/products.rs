//! Product catalogue: cache-first reads, long TTLs.

use crate::backend::CacheBackend;
use crate::conditional::{CachedResponse, RequestConditions};
use crate::document::{Document, PagedDocument};
use crate::http::error::ApiError;
use crate::http::extract::{Authenticated, PageQuery};
use crate::http::AppState;
use crate::key::Endpoint;
use crate::models::Product;
use crate::pagination::paginate;
use crate::repository::{ProductRepository, Store};
use axum::extract::{Path, State};
use axum::http::StatusCode;

/// `GET /api/products?page&limit`
pub async fn list_products<S: Store, B: CacheBackend>(
    Authenticated(_): Authenticated,
    State(state): State<AppState<S, B>>,
    PageQuery(page): PageQuery,
    conditions: RequestConditions,
) -> Result<CachedResponse, ApiError> {
    let policy = Endpoint::ProductList { page }.policy(state.ttls.product_list);
    let store = state.store.clone();
    let links = state.links.clone();

    let document: PagedDocument<Product> = state
        .cache
        .get_or_compute(&policy, || async move {
            let (total, items) = futures::try_join!(
                store.count_products(),
                store.find_products(page.offset(), page.limit())
            )?;
            let window = paginate(total, page);
            Ok::<_, ApiError>(PagedDocument::from_window(items, &window, |p, l| {
                links.products_page(p, l)
            }))
        })
        .await?;

    Ok(CachedResponse::build(
        &document,
        StatusCode::OK,
        policy.ttl,
        &conditions,
    )?)
}

/// `GET /api/products/{id}`
///
/// A missing product is not cached; the 404 is recomputed on every call.
pub async fn get_product<S: Store, B: CacheBackend>(
    Authenticated(_): Authenticated,
    State(state): State<AppState<S, B>>,
    Path(id): Path<i64>,
    conditions: RequestConditions,
) -> Result<CachedResponse, ApiError> {
    let policy = Endpoint::ProductDetail { id }.policy(state.ttls.product);
    let store = state.store.clone();
    let links = state.links.clone();

    let document: Document<Product> = state
        .cache
        .get_or_compute(&policy, || async move {
            let product = store
                .find_product(id)
                .await?
                .ok_or_else(|| ApiError::not_found("Product not found"))?;
            Ok::<_, ApiError>(Document::new(product, links.product_links(id)))
        })
        .await?;

    Ok(CachedResponse::build(
        &document,
        StatusCode::OK,
        policy.ttl,
        &conditions,
    )?)
}
