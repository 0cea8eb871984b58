//! Request extractors shared by the handlers.

use super::error::ApiError;
use super::AppState;
use crate::auth::Identity;
use crate::backend::CacheBackend;
use crate::pagination::PageRequest;
use crate::repository::Store;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;
use std::convert::Infallible;

/// The authenticated caller; rejects with 401 when credentials are
/// missing or wrong.
#[derive(Clone, Debug)]
pub struct Authenticated(pub Identity);

impl<S, B> FromRequestParts<AppState<S, B>> for Authenticated
where
    S: Store,
    B: CacheBackend,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S, B>,
    ) -> Result<Self, Self::Rejection> {
        match state
            .authenticator
            .authenticate(&state.store, &parts.headers)
            .await?
        {
            Some(identity) => Ok(Authenticated(identity)),
            None => Err(ApiError::Unauthorized),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PageParams {
    page: Option<String>,
    limit: Option<String>,
}

/// `?page=&limit=`. Never rejects: unusable values fall back to the
/// defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageQuery(pub PageRequest);

impl<S> FromRequestParts<S> for PageQuery
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let params = Query::<PageParams>::try_from_uri(&parts.uri)
            .map(|Query(params)| params)
            .unwrap_or_default();
        Ok(PageQuery(PageRequest::from_query(
            params.page.as_deref(),
            params.limit.as_deref(),
        )))
    }
}
