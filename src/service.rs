//! Shared handle to the response cache.
//!
//! Wraps [`CacheExpander`] in an `Arc` together with the strategy chosen at
//! startup, so handlers clone it freely out of the application state.

use crate::backend::CacheBackend;
use crate::error::Result;
use crate::expander::CacheExpander;
use crate::key::{CachePolicy, TagSet};
use crate::observability::CacheMetrics;
use crate::payload::CachePayload;
use crate::strategy::CacheStrategy;
use std::future::Future;
use std::sync::Arc;

/// Cheaply cloneable response cache.
///
/// # Example
///
/// ```
/// use catalog_api::{backend::InMemoryBackend, CacheService, CacheStrategy};
///
/// let cache = CacheService::new(InMemoryBackend::new());
/// let handle = cache.clone(); // just an Arc increment
/// assert_eq!(handle.strategy(), CacheStrategy::Refresh);
/// ```
pub struct CacheService<B: CacheBackend> {
    expander: Arc<CacheExpander<B>>,
    strategy: CacheStrategy,
}

impl<B: CacheBackend> Clone for CacheService<B> {
    fn clone(&self) -> Self {
        CacheService {
            expander: Arc::clone(&self.expander),
            strategy: self.strategy,
        }
    }
}

impl<B: CacheBackend> CacheService<B> {
    /// Create a new cache service with the given backend.
    pub fn new(backend: B) -> Self {
        CacheService {
            expander: Arc::new(CacheExpander::new(backend)),
            strategy: CacheStrategy::default(),
        }
    }

    /// Create a new cache service with custom metrics.
    pub fn with_metrics(backend: B, metrics: Box<dyn CacheMetrics>) -> Self {
        CacheService {
            expander: Arc::new(CacheExpander::new(backend).with_metrics(metrics)),
            strategy: CacheStrategy::default(),
        }
    }

    /// Replace the strategy used by [`get_or_compute`](Self::get_or_compute).
    pub fn with_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> CacheStrategy {
        self.strategy
    }

    /// Get-or-compute with the service's strategy.
    ///
    /// See [`CacheExpander::get_or_compute`].
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        policy: &CachePolicy,
        compute: F,
    ) -> std::result::Result<T, E>
    where
        T: CachePayload,
        E: Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = std::result::Result<T, E>> + Send,
    {
        self.expander
            .get_or_compute(policy, self.strategy, compute)
            .await
    }

    /// Remove every entry carrying at least one of `tags`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the backend is unavailable.
    pub async fn invalidate_tags(&self, tags: &TagSet) -> Result<usize> {
        self.expander.invalidate_tags(tags).await
    }

    /// Backend health, for readiness reporting.
    pub async fn health_check(&self) -> Result<bool> {
        self.expander.backend().health_check().await
    }

    /// Get a reference to the underlying expander.
    pub fn expander(&self) -> &CacheExpander<B> {
        &self.expander
    }
}
