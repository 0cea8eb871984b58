//! HTTP error taxonomy and the JSON error envelope.
//!
//! Every 4xx/5xx response leaves the router as
//! `{"status": 404, "message": "...", "error": true, "path": "/api/..."}`.
//! [`ApiError`] renders the envelope directly; [`error_envelope`] fills in
//! the request path and rewraps responses produced by the framework itself
//! (path rejections, unknown routes, wrong methods).

use crate::error::Error;
use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::header::{ALLOW, WWW_AUTHENTICATE};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Challenge sent with every 401.
pub const BASIC_CHALLENGE: &str = "Basic realm=\"api\"";

/// Upper bound on framework error bodies read back by [`error_envelope`].
const REJECTION_BODY_LIMIT: usize = 16 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    /// The cause is logged, never sent to the client.
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Body of every error response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub status: u16,
    pub message: String,
    pub error: bool,
    pub path: String,
}

impl ErrorEnvelope {
    pub fn new(status: StatusCode, message: impl Into<String>, path: impl Into<String>) -> Self {
        ErrorEnvelope {
            status: status.as_u16(),
            message: message.into(),
            error: true,
            path: path.into(),
        }
    }
}

/// Client-facing message of an [`ApiError`] response, carried in the
/// response extensions so [`error_envelope`] can re-render it with the path.
#[derive(Clone, Debug)]
struct ErrorMessage(String);

fn render(status: StatusCode, envelope: ErrorEnvelope) -> Response {
    let mut response = (status, Json(envelope)).into_response();
    if status == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_CHALLENGE));
    }
    response
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(cause) = &self {
            error!("Request failed: {}", cause);
        }

        let status = self.status();
        let message = self.to_string();
        let mut response = render(status, ErrorEnvelope::new(status, message.clone(), ""));
        response.extensions_mut().insert(ErrorMessage(message));
        response
    }
}

/// Response middleware putting every error response into the envelope.
pub async fn error_envelope(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let message = match parts.extensions.remove::<ErrorMessage>() {
        Some(ErrorMessage(message)) => message,
        None => rejection_message(status, body).await,
    };

    if status.is_server_error() {
        error!("{} {} -> {}: {}", method, path, status.as_u16(), message);
    } else {
        warn!("{} {} -> {}: {}", method, path, status.as_u16(), message);
    }

    let mut rebuilt = render(status, ErrorEnvelope::new(status, message, path));
    if let Some(allow) = parts.headers.remove(ALLOW) {
        rebuilt.headers_mut().insert(ALLOW, allow);
    }
    rebuilt
}

async fn rejection_message(status: StatusCode, body: Body) -> String {
    let text = match to_bytes(body, REJECTION_BODY_LIMIT).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Err(_) => String::new(),
    };
    if text.is_empty() {
        status.canonical_reason().unwrap_or("Error").to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn envelope(response: Response) -> ErrorEnvelope {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        serde_json::from_slice(&bytes).expect("Failed to parse envelope")
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_core_errors_convert() {
        assert!(matches!(
            ApiError::from(Error::Conflict("dup".into())),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(Error::RepositoryError("down".into())),
            ApiError::Internal(_)
        ));
    }

    #[tokio::test]
    async fn test_internal_error_hides_cause() {
        let response = ApiError::Internal("connection refused on 10.0.0.5".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = envelope(response).await;
        assert_eq!(body.message, "Internal server error");
        assert!(body.error);
        assert_eq!(body.status, 500);
    }

    #[tokio::test]
    async fn test_unauthorized_carries_challenge() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.headers()[WWW_AUTHENTICATE], BASIC_CHALLENGE);
        assert_eq!(envelope(response).await.message, "Unauthorized");
    }
}
