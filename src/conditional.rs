//! Conditional responses: ETag derivation, `If-None-Match` evaluation and
//! the final HTTP response for cached payloads.
//!
//! The ETag is derived from the exact bytes sent to the client, so a payload
//! served from cache and the same payload freshly computed carry the same
//! validator.

use crate::error::Result;
use axum::body::Bytes;
use axum::extract::FromRequestParts;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_NONE_MATCH, LOCATION};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::convert::Infallible;
use std::time::Duration;

/// Strong ETag for a response body: the first 128 bits of its SHA-256,
/// hex encoded and quoted.
pub fn etag_for(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("\"{}\"", hex::encode(&digest[..16]))
}

/// `Cache-Control` value for a shared-cacheable response.
pub fn cache_control(max_age: Duration) -> String {
    let secs = max_age.as_secs();
    format!("public, max-age={}, s-maxage={}", secs, secs)
}

fn opaque_tag(validator: &str) -> &str {
    let validator = validator.trim();
    validator.strip_prefix("W/").unwrap_or(validator)
}

/// Weak comparison of an `If-None-Match` header value against `etag`.
///
/// Handles `*`, comma-separated lists and `W/` validators.
pub fn if_none_match_matches(header: &str, etag: &str) -> bool {
    let current = opaque_tag(etag);
    header.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || (!candidate.is_empty() && opaque_tag(candidate) == current)
    })
}

/// The parts of a request that decide between a full response and 304.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestConditions {
    method: Method,
    if_none_match: Option<String>,
}

impl RequestConditions {
    pub fn new(method: Method, if_none_match: Option<String>) -> Self {
        RequestConditions {
            method,
            if_none_match,
        }
    }

    /// Read conditions from request headers; repeated `If-None-Match`
    /// headers are merged into one list.
    pub fn from_headers(method: &Method, headers: &HeaderMap) -> Self {
        let values: Vec<&str> = headers
            .get_all(IF_NONE_MATCH)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        let if_none_match = if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        };

        RequestConditions::new(method.clone(), if_none_match)
    }

    /// Unconditional GET.
    pub fn get() -> Self {
        RequestConditions::new(Method::GET, None)
    }

    pub fn is_safe(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    /// Whether a client holding `etag` already has the current
    /// representation.
    pub fn not_modified(&self, etag: &str) -> bool {
        self.is_safe()
            && self
                .if_none_match
                .as_deref()
                .is_some_and(|header| if_none_match_matches(header, etag))
    }
}

impl<S> FromRequestParts<S> for RequestConditions
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(RequestConditions::from_headers(&parts.method, &parts.headers))
    }
}

/// A serialized payload ready to be sent, or a 304 in its place.
#[derive(Clone, Debug)]
pub struct CachedResponse {
    status: StatusCode,
    body: Bytes,
    etag: String,
    cache_control: String,
    location: Option<String>,
}

impl CachedResponse {
    /// Serialize `payload` and decide the response status.
    ///
    /// `status` is used unless the request is a safe method whose
    /// `If-None-Match` matches, in which case the response is 304 with an
    /// empty body.
    ///
    /// # Errors
    ///
    /// Returns `Error::SerializationError` if the payload cannot be
    /// serialized to JSON.
    pub fn build<T: Serialize>(
        payload: &T,
        status: StatusCode,
        max_age: Duration,
        conditions: &RequestConditions,
    ) -> Result<Self> {
        let body = serde_json::to_vec(payload)?;
        let etag = etag_for(&body);

        let (status, body) = if conditions.not_modified(&etag) {
            (StatusCode::NOT_MODIFIED, Bytes::new())
        } else {
            (status, Bytes::from(body))
        };

        Ok(CachedResponse {
            status,
            body,
            etag,
            cache_control: cache_control(max_age),
            location: None,
        })
    }

    /// Attach a `Location` header (resource creation).
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }

    pub fn cache_control(&self) -> &str {
        &self.cache_control
    }
}

impl IntoResponse for CachedResponse {
    fn into_response(self) -> Response {
        let mut response = if self.status == StatusCode::NOT_MODIFIED {
            StatusCode::NOT_MODIFIED.into_response()
        } else {
            (
                self.status,
                [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                self.body,
            )
                .into_response()
        };

        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&self.etag) {
            headers.insert(ETAG, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.cache_control) {
            headers.insert(CACHE_CONTROL, value);
        }
        if let Some(location) = self.location.as_deref() {
            match HeaderValue::from_str(location) {
                Ok(value) => {
                    headers.insert(LOCATION, value);
                }
                Err(e) => warn!("Dropping invalid Location header {}: {}", location, e),
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> serde_json::Value {
        json!({ "data": { "id": 42, "name": "Phone" }, "_links": {} })
    }

    fn with_header(method: Method, value: &str) -> RequestConditions {
        RequestConditions::new(method, Some(value.to_string()))
    }

    #[test]
    fn test_etag_format() {
        let etag = etag_for(b"{}");
        assert_eq!(etag.len(), 34);
        assert!(etag.starts_with('"') && etag.ends_with('"'));
        assert!(etag[1..33].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(etag, etag_for(b"{}"));
        assert_ne!(etag, etag_for(b"[]"));
    }

    #[test]
    fn test_cache_control_value() {
        assert_eq!(
            cache_control(Duration::from_secs(60)),
            "public, max-age=60, s-maxage=60"
        );
    }

    #[test]
    fn test_if_none_match_variants() {
        let etag = "\"abc\"";
        assert!(if_none_match_matches("\"abc\"", etag));
        assert!(if_none_match_matches("*", etag));
        assert!(if_none_match_matches("\"x\", \"abc\"", etag));
        assert!(if_none_match_matches("W/\"abc\"", etag));
        assert!(!if_none_match_matches("\"abd\"", etag));
        assert!(!if_none_match_matches("", etag));
        assert!(!if_none_match_matches(" , ", etag));
    }

    #[test]
    fn test_matching_get_is_not_modified() {
        let full = CachedResponse::build(
            &payload(),
            StatusCode::OK,
            Duration::from_secs(86400),
            &RequestConditions::get(),
        )
        .unwrap();
        assert_eq!(full.status(), StatusCode::OK);
        assert!(!full.body().is_empty());

        let conditional = CachedResponse::build(
            &payload(),
            StatusCode::OK,
            Duration::from_secs(86400),
            &with_header(Method::GET, full.etag()),
        )
        .unwrap();
        assert_eq!(conditional.status(), StatusCode::NOT_MODIFIED);
        assert!(conditional.body().is_empty());
        assert_eq!(conditional.etag(), full.etag());
    }

    #[test]
    fn test_stale_validator_gets_full_body() {
        let response = CachedResponse::build(
            &payload(),
            StatusCode::OK,
            Duration::from_secs(60),
            &with_header(Method::GET, "\"0000\""),
        )
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(response.body()).unwrap(),
            payload()
        );
    }

    #[test]
    fn test_unsafe_method_never_not_modified() {
        let response = CachedResponse::build(
            &payload(),
            StatusCode::CREATED,
            Duration::from_secs(60),
            &with_header(Method::POST, "*"),
        )
        .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        assert!(with_header(Method::HEAD, "*").not_modified("\"a\""));
    }

    #[test]
    fn test_conditions_from_headers_merges_values() {
        let mut headers = HeaderMap::new();
        headers.append(IF_NONE_MATCH, HeaderValue::from_static("\"a\""));
        headers.append(IF_NONE_MATCH, HeaderValue::from_static("\"b\""));

        let conditions = RequestConditions::from_headers(&Method::GET, &headers);
        assert!(conditions.not_modified("\"b\""));
        assert!(!RequestConditions::from_headers(&Method::GET, &HeaderMap::new())
            .not_modified("\"b\""));
    }

    #[test]
    fn test_into_response_headers() {
        let built = CachedResponse::build(
            &payload(),
            StatusCode::CREATED,
            Duration::from_secs(60),
            &RequestConditions::new(Method::POST, None),
        )
        .unwrap()
        .with_location("http://api.test/api/users/3");
        let etag = built.etag().to_string();

        let response = built.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let headers = response.headers();
        assert_eq!(headers[ETAG], etag.as_str());
        assert_eq!(headers[CACHE_CONTROL], "public, max-age=60, s-maxage=60");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[LOCATION], "http://api.test/api/users/3");
    }

    #[test]
    fn test_not_modified_response_keeps_validators() {
        let etag = CachedResponse::build(
            &payload(),
            StatusCode::OK,
            Duration::from_secs(60),
            &RequestConditions::get(),
        )
        .unwrap()
        .etag()
        .to_string();

        let response = CachedResponse::build(
            &payload(),
            StatusCode::OK,
            Duration::from_secs(60),
            &with_header(Method::GET, &etag),
        )
        .unwrap()
        .into_response();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(response.headers()[ETAG], etag.as_str());
        assert!(response.headers().contains_key(CACHE_CONTROL));
        assert!(!response.headers().contains_key(CONTENT_TYPE));
    }
}
