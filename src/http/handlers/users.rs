//! User detail and deletion.
//!
//! The user is loaded before the cache is consulted: ownership decides
//! whether the caller may see the cached document at all.

use crate::auth::{authorize_customer, Identity};
use crate::backend::CacheBackend;
use crate::conditional::{CachedResponse, RequestConditions};
use crate::document::Document;
use crate::http::error::ApiError;
use crate::http::extract::Authenticated;
use crate::http::AppState;
use crate::key::{Endpoint, Mutation};
use crate::models::{User, UserView};
use crate::repository::{Store, UserRepository};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

/// Load a customer-owned user the caller may act on; returns it with its
/// customer id.
async fn load_owned_user<S: Store>(
    store: &S,
    identity: &Identity,
    id: i64,
) -> Result<(User, i64), ApiError> {
    let user = store
        .find_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let customer_id = user
        .customer_id
        .ok_or_else(|| ApiError::not_found("User is not linked to any customer"))?;

    if !authorize_customer(identity, customer_id) {
        return Err(ApiError::forbidden(
            "You are not allowed to access users of this customer",
        ));
    }
    Ok((user, customer_id))
}

/// `GET /api/users/{id}`
pub async fn get_user<S: Store, B: CacheBackend>(
    Authenticated(identity): Authenticated,
    State(state): State<AppState<S, B>>,
    Path(id): Path<i64>,
    conditions: RequestConditions,
) -> Result<CachedResponse, ApiError> {
    let (user, customer_id) = load_owned_user(&state.store, &identity, id).await?;

    let policy = Endpoint::UserDetail {
        id,
        customer_id: Some(customer_id),
    }
    .policy(state.ttls.user);
    let links = state.links.user_links(id, Some(customer_id));

    let document: Document<UserView> = state
        .cache
        .get_or_compute(&policy, || async move {
            Ok::<_, ApiError>(Document::new(user.view(), links))
        })
        .await?;

    Ok(CachedResponse::build(
        &document,
        StatusCode::OK,
        policy.ttl,
        &conditions,
    )?)
}

/// `DELETE /api/users/{id}`
pub async fn delete_user<S: Store, B: CacheBackend>(
    Authenticated(identity): Authenticated,
    State(state): State<AppState<S, B>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let (_, customer_id) = load_owned_user(&state.store, &identity, id).await?;

    if !state.store.remove_user(id).await? {
        // Deleted concurrently between the lookup and the delete
        return Err(ApiError::not_found("User not found"));
    }
    info!("User {} of customer {} deleted by {}", id, customer_id, identity.email);

    state
        .invalidator
        .invalidate(Mutation::UserDeleted {
            id,
            customer_id: Some(customer_id),
        })
        .await;

    Ok(Json(json!({ "message": "User successfully deleted" })))
}
