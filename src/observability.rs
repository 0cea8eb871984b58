//! Metrics collection for cache operations.
//!
//! Implement [`CacheMetrics`] to forward cache events to a monitoring
//! system. Two implementations ship with the crate:
//!
//! - [`NoOpMetrics`]: the default; discards everything.
//! - [`AtomicMetrics`]: lock-free counters, snapshotted by `GET /health`.
//!
//! ```
//! use catalog_api::observability::{AtomicMetrics, CacheMetrics};
//! use std::time::Duration;
//!
//! let metrics = AtomicMetrics::new();
//! metrics.record_hit("product_1", Duration::from_micros(40));
//! metrics.record_miss("product_2", Duration::from_micros(90));
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!((snapshot.hits, snapshot.misses), (1, 1));
//! ```
//!
//! # Metrics Methods
//!
//! - `record_hit()` / `record_miss()` - lookup outcome with duration
//! - `record_set()` - cache write with duration
//! - `record_invalidate()` - tag invalidation with removed entry count
//! - `record_error()` - backend or decode failure (the request still succeeds)

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// Record a cache hit.
    fn record_hit(&self, key: &str, duration: Duration) {
        debug!("Cache HIT: {} took {:?}", key, duration);
    }

    /// Record a cache miss.
    fn record_miss(&self, key: &str, duration: Duration) {
        debug!("Cache MISS: {} took {:?}", key, duration);
    }

    /// Record a cache set operation.
    fn record_set(&self, key: &str, duration: Duration) {
        debug!("Cache SET: {} took {:?}", key, duration);
    }

    /// Record a tag invalidation and how many entries it removed.
    fn record_invalidate(&self, tags: &[&str], removed: usize, duration: Duration) {
        debug!(
            "Cache INVALIDATE: {:?} removed {} took {:?}",
            tags, removed, duration
        );
    }

    /// Record an error.
    fn record_error(&self, key: &str, error: &str) {
        warn!("Cache ERROR for {}: {}", key, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_set(&self, _key: &str, _duration: Duration) {}
    fn record_invalidate(&self, _tags: &[&str], _removed: usize, _duration: Duration) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// Counter-based metrics, safe to share between handlers.
#[derive(Default)]
pub struct AtomicMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    invalidations: AtomicU64,
    invalidated_entries: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of [`AtomicMetrics`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub invalidations: u64,
    pub invalidated_entries: u64,
    pub errors: u64,
}

impl MetricsSnapshot {
    /// Fraction of lookups served from cache, `0.0` before any lookup.
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            invalidated_entries: self.invalidated_entries.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl CacheMetrics for AtomicMetrics {
    fn record_hit(&self, key: &str, duration: Duration) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!("Cache HIT: {} took {:?}", key, duration);
    }

    fn record_miss(&self, key: &str, duration: Duration) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Cache MISS: {} took {:?}", key, duration);
    }

    fn record_set(&self, _key: &str, _duration: Duration) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    fn record_invalidate(&self, _tags: &[&str], removed: usize, _duration: Duration) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        self.invalidated_entries
            .fetch_add(removed as u64, Ordering::Relaxed);
    }

    fn record_error(&self, key: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        warn!("Cache ERROR for {}: {}", key, error);
    }
}

/// Lets one `Arc<AtomicMetrics>` be handed to the cache while the caller
/// keeps a handle for snapshots.
impl<M: CacheMetrics + ?Sized> CacheMetrics for std::sync::Arc<M> {
    fn record_hit(&self, key: &str, duration: Duration) {
        (**self).record_hit(key, duration)
    }

    fn record_miss(&self, key: &str, duration: Duration) {
        (**self).record_miss(key, duration)
    }

    fn record_set(&self, key: &str, duration: Duration) {
        (**self).record_set(key, duration)
    }

    fn record_invalidate(&self, tags: &[&str], removed: usize, duration: Duration) {
        (**self).record_invalidate(tags, removed, duration)
    }

    fn record_error(&self, key: &str, error: &str) {
        (**self).record_error(key, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_noop_metrics() {
        let metrics = NoOpMetrics;
        metrics.record_hit("key", Duration::from_secs(1));
        metrics.record_miss("key", Duration::from_secs(2));
        metrics.record_invalidate(&["users"], 3, Duration::from_millis(1));
    }

    #[test]
    fn test_atomic_metrics_counts() {
        let metrics = AtomicMetrics::new();
        metrics.record_hit("a", Duration::ZERO);
        metrics.record_hit("a", Duration::ZERO);
        metrics.record_miss("b", Duration::ZERO);
        metrics.record_set("b", Duration::ZERO);
        metrics.record_invalidate(&["users", "user_5"], 4, Duration::ZERO);
        metrics.record_error("c", "boom");

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                hits: 2,
                misses: 1,
                sets: 1,
                invalidations: 1,
                invalidated_entries: 4,
                errors: 1,
            }
        );
    }

    #[test]
    fn test_hit_ratio() {
        assert_eq!(MetricsSnapshot::default().hit_ratio(), 0.0);
        let snapshot = MetricsSnapshot {
            hits: 3,
            misses: 1,
            ..MetricsSnapshot::default()
        };
        assert!((snapshot.hit_ratio() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shared_arc_handle() {
        let metrics = Arc::new(AtomicMetrics::new());
        let boxed: Box<dyn CacheMetrics> = Box::new(Arc::clone(&metrics));
        boxed.record_miss("k", Duration::ZERO);
        assert_eq!(metrics.snapshot().misses, 1);
    }
}
