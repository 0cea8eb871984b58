pub mod customers;
pub mod products;
pub mod users;

use super::error::ApiError;
use super::AppState;
use crate::backend::CacheBackend;
use crate::observability::MetricsSnapshot;
use crate::repository::Store;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub cache_strategy: String,
    pub cache_backend_healthy: bool,
    pub cache: MetricsSnapshot,
}

/// `GET /health`. Always 200: the API keeps serving from the repositories
/// when the cache backend is down, so a broken cache only shows as
/// `"degraded"`.
pub async fn health<S: Store, B: CacheBackend>(
    State(state): State<AppState<S, B>>,
) -> Json<HealthReport> {
    let healthy = match state.cache.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            warn!("Cache health check failed: {}", e);
            false
        }
    };

    Json(HealthReport {
        status: if healthy { "ok" } else { "degraded" },
        cache_strategy: state.cache.strategy().to_string(),
        cache_backend_healthy: healthy,
        cache: state.metrics.snapshot(),
    })
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
