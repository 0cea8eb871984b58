//! Cache expander - get-or-compute and tag invalidation over a backend.

use crate::backend::{CacheBackend, TagVersion};
use crate::error::Result;
use crate::key::{CachePolicy, TagSet};
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::payload::CachePayload;
use crate::strategy::CacheStrategy;
use std::future::Future;
use std::time::Instant;

/// Core cache expander - handles cache lookup and fallback logic.
///
/// The cache never fails a request: backend errors and undecodable entries
/// are logged, counted, and treated as a miss. Only the compute closure can
/// make [`get_or_compute`](Self::get_or_compute) fail.
///
/// # Example
///
/// ```
/// use catalog_api::backend::InMemoryBackend;
/// use catalog_api::document::{Document, Links};
/// use catalog_api::key::Endpoint;
/// use catalog_api::strategy::CacheStrategy;
/// use catalog_api::CacheExpander;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> catalog_api::Result<()> {
/// let expander = CacheExpander::new(InMemoryBackend::new());
/// let policy = Endpoint::ProductDetail { id: 1 }.policy(Duration::from_secs(60));
///
/// let doc = expander
///     .get_or_compute(&policy, CacheStrategy::Refresh, || async {
///         Ok::<_, catalog_api::Error>(Document::new("phone".to_string(), Links::new()))
///     })
///     .await?;
/// assert_eq!(doc.data, "phone");
/// # Ok(())
/// # }
/// ```
pub struct CacheExpander<B: CacheBackend> {
    backend: B,
    metrics: Box<dyn CacheMetrics>,
}

impl<B: CacheBackend> CacheExpander<B> {
    /// Create new expander with given backend.
    pub fn new(backend: B) -> Self {
        CacheExpander {
            backend,
            metrics: Box::new(NoOpMetrics),
        }
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Box<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Return the cached value for `policy.key`, or compute, store and
    /// return it.
    ///
    /// - hit: the stored value is returned and `compute` is not invoked;
    /// - miss: `compute` runs once and its value is stored with the
    ///   policy's TTL and tags;
    /// - `compute` errors are returned unchanged and nothing is stored;
    /// - a value whose tags were invalidated while `compute` ran is returned
    ///   but not stored, since it may describe data from before the write.
    ///
    /// With [`CacheStrategy::Bypass`] the backend is not touched at all.
    ///
    /// Concurrent misses on the same key may each compute; the last write
    /// wins.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        policy: &CachePolicy,
        strategy: CacheStrategy,
        compute: F,
    ) -> std::result::Result<T, E>
    where
        T: CachePayload,
        E: Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = std::result::Result<T, E>> + Send,
    {
        let timer = Instant::now();
        let key = policy.key.as_str();

        debug!("» Cache lookup for key: {} (strategy: {})", key, strategy);

        if !strategy.uses_cache() {
            debug!("Bypassing cache for {}", key);
            return compute().await;
        }

        if let Some(value) = self.read::<T>(key).await {
            self.metrics.record_hit(key, timer.elapsed());
            return Ok(value);
        }
        self.metrics.record_miss(key, timer.elapsed());

        let version = self.version(policy).await;
        let value = compute().await?;
        if let Some(version) = version {
            self.write(policy, &value, version).await;
        }
        Ok(value)
    }

    /// Snapshot of the policy's tag version; `None` when it cannot be read,
    /// in which case the computed value is not stored.
    async fn version(&self, policy: &CachePolicy) -> Option<TagVersion> {
        match self.backend.tag_version(&policy.tags).await {
            Ok(version) => Some(version),
            Err(e) => {
                warn!("Cache version read failed for {}, not storing: {}", policy.key, e);
                self.metrics.record_error(&policy.key, &e.to_string());
                None
            }
        }
    }

    /// Read and decode one entry; every failure is a miss.
    async fn read<T: CachePayload>(&self, key: &str) -> Option<T> {
        let bytes = match self.backend.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                error!("Cache read failed for {}, computing instead: {}", key, e);
                self.metrics.record_error(key, &e.to_string());
                return None;
            }
        };

        let decoded = T::deserialize_from_cache(&bytes).and_then(|value| {
            value.validate()?;
            Ok(value)
        });

        match decoded {
            Ok(value) => {
                debug!("✓ Cache hit for {}", key);
                Some(value)
            }
            Err(e) => {
                warn!("Evicting undecodable cache entry {}: {}", key, e);
                self.metrics.record_error(key, &e.to_string());
                if let Err(e) = self.backend.delete(key).await {
                    warn!("Failed to evict {}: {}", key, e);
                }
                None
            }
        }
    }

    /// Store a computed value unless its tags moved past `version`; failures
    /// are logged and dropped.
    async fn write<T: CachePayload>(&self, policy: &CachePolicy, value: &T, version: TagVersion) {
        let timer = Instant::now();
        let key = policy.key.as_str();

        let bytes = match value.serialize_for_cache() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to serialize cache entry {}: {}", key, e);
                self.metrics.record_error(key, &e.to_string());
                return;
            }
        };

        match self
            .backend
            .set_if_current(key, bytes, Some(policy.ttl), &policy.tags, version)
            .await
        {
            Ok(true) => self.metrics.record_set(key, timer.elapsed()),
            Ok(false) => debug!("Discarded {}: invalidated while computing", key),
            Err(e) => {
                warn!("Cache write failed for {}: {}", key, e);
                self.metrics.record_error(key, &e.to_string());
            }
        }
    }

    /// Remove every entry carrying at least one of `tags`.
    ///
    /// # Errors
    ///
    /// Returns the backend error; callers decide whether it is fatal.
    pub async fn invalidate_tags(&self, tags: &TagSet) -> Result<usize> {
        let timer = Instant::now();
        let names: Vec<&str> = tags.iter().map(|t| t.as_str()).collect();

        match self.backend.invalidate_tags(tags).await {
            Ok(removed) => {
                self.metrics
                    .record_invalidate(&names, removed, timer.elapsed());
                debug!("✓ Invalidated {:?}: {} entries", names, removed);
                Ok(removed)
            }
            Err(e) => {
                self.metrics.record_error(&names.join(","), &e.to_string());
                Err(e)
            }
        }
    }

    /// Get backend reference (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::document::{Document, Links};
    use crate::error::Error;
    use crate::key::{Endpoint, Mutation, Tag};
    use crate::observability::AtomicMetrics;
    use crate::pagination::PageRequest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    type Doc = Document<String>;

    fn doc(text: &str) -> Doc {
        Document::new(text.to_string(), Links::new())
    }

    fn user_policy(id: i64) -> CachePolicy {
        Endpoint::UserDetail {
            id,
            customer_id: Some(3),
        }
        .policy(Duration::from_secs(60))
    }

    /// Backend whose every operation fails, as if Redis were down.
    #[derive(Clone)]
    struct UnavailableBackend;

    impl CacheBackend for UnavailableBackend {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(Error::BackendError("connection refused".into()))
        }

        async fn set(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _ttl: Option<Duration>,
            _tags: &TagSet,
        ) -> Result<()> {
            Err(Error::BackendError("connection refused".into()))
        }

        async fn set_if_current(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _ttl: Option<Duration>,
            _tags: &TagSet,
            _version: TagVersion,
        ) -> Result<bool> {
            Err(Error::BackendError("connection refused".into()))
        }

        async fn tag_version(&self, _tags: &TagSet) -> Result<TagVersion> {
            Err(Error::BackendError("connection refused".into()))
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            Err(Error::BackendError("connection refused".into()))
        }

        async fn invalidate_tags(&self, _tags: &TagSet) -> Result<usize> {
            Err(Error::BackendError("connection refused".into()))
        }
    }

    async fn fetch(
        expander: &CacheExpander<impl CacheBackend>,
        policy: &CachePolicy,
        strategy: CacheStrategy,
        calls: &AtomicUsize,
        text: &str,
    ) -> Doc {
        expander
            .get_or_compute(policy, strategy, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(doc(text))
            })
            .await
            .expect("Failed to compute")
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let expander = CacheExpander::new(InMemoryBackend::new());
        let calls = AtomicUsize::new(0);
        let policy = user_policy(5);

        let first = fetch(&expander, &policy, CacheStrategy::Refresh, &calls, "v1").await;
        let second = fetch(&expander, &policy, CacheStrategy::Refresh, &calls, "v2").await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(second.data, "v1");
    }

    #[tokio::test]
    async fn test_invalidation_forces_recompute() {
        let expander = CacheExpander::new(InMemoryBackend::new());
        let calls = AtomicUsize::new(0);
        let policy = user_policy(5);

        fetch(&expander, &policy, CacheStrategy::Refresh, &calls, "v1").await;
        let removed = expander
            .invalidate_tags(&[Tag::user(5)].into())
            .await
            .expect("Failed to invalidate");
        assert_eq!(removed, 1);

        let after = fetch(&expander, &policy, CacheStrategy::Refresh, &calls, "v2").await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(after.data, "v2");
    }

    #[tokio::test]
    async fn test_unrelated_invalidation_keeps_entry() {
        let expander = CacheExpander::new(InMemoryBackend::new());
        let calls = AtomicUsize::new(0);
        let policy = user_policy(5);

        fetch(&expander, &policy, CacheStrategy::Refresh, &calls, "v1").await;
        expander
            .invalidate_tags(&[Tag::user(6), Tag::products()].into())
            .await
            .expect("Failed to invalidate");
        fetch(&expander, &policy, CacheStrategy::Refresh, &calls, "v2").await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_compute_error_is_returned_and_not_cached() {
        let backend = InMemoryBackend::new();
        let expander = CacheExpander::new(backend.clone());
        let policy = user_policy(8);

        let result: std::result::Result<Doc, String> = expander
            .get_or_compute(&policy, CacheStrategy::Refresh, || async {
                Err("User not found".to_string())
            })
            .await;

        assert_eq!(result.unwrap_err(), "User not found");
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_entry_stored_with_policy_tags() {
        let backend = InMemoryBackend::new();
        let expander = CacheExpander::new(backend.clone());
        let calls = AtomicUsize::new(0);

        fetch(&expander, &user_policy(5), CacheStrategy::Refresh, &calls, "v1").await;

        let removed = backend
            .invalidate_tags(&[Tag::customer_users(3)].into())
            .await
            .expect("Failed to invalidate");
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_evicted_and_recomputed() {
        let backend = InMemoryBackend::new();
        let expander = CacheExpander::new(backend.clone());
        let calls = AtomicUsize::new(0);
        let policy = user_policy(5);

        backend
            .set(&policy.key, b"garbage".to_vec(), None, &policy.tags)
            .await
            .expect("Failed to set");

        let value = fetch(&expander, &policy, CacheStrategy::Refresh, &calls, "fresh").await;
        assert_eq!(value.data, "fresh");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stored = backend
            .get(&policy.key)
            .await
            .expect("Failed to get")
            .expect("Entry was not repopulated");
        assert_eq!(Doc::deserialize_from_cache(&stored).expect("Bad entry"), value);
    }

    #[tokio::test]
    async fn test_unavailable_backend_fails_open() {
        let metrics = Arc::new(AtomicMetrics::new());
        let expander =
            CacheExpander::new(UnavailableBackend).with_metrics(Box::new(Arc::clone(&metrics)));
        let calls = AtomicUsize::new(0);
        let policy = user_policy(5);

        let value = fetch(&expander, &policy, CacheStrategy::Refresh, &calls, "db").await;
        assert_eq!(value.data, "db");
        fetch(&expander, &policy, CacheStrategy::Refresh, &calls, "db").await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // one read and one version failure per request
        assert_eq!(metrics.snapshot().errors, 4);

        assert!(expander
            .invalidate_tags(&[Tag::users()].into())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_bypass_never_touches_backend() {
        let backend = InMemoryBackend::new();
        let expander = CacheExpander::new(backend.clone());
        let calls = AtomicUsize::new(0);
        let policy = user_policy(5);

        fetch(&expander, &policy, CacheStrategy::Bypass, &calls, "v1").await;
        let second = fetch(&expander, &policy, CacheStrategy::Bypass, &calls, "v2").await;
        assert_eq!(second.data, "v2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(backend.is_empty());

        let cached = fetch(&expander, &policy, CacheStrategy::Refresh, &calls, "v3").await;
        assert_eq!(cached.data, "v3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_write_during_compute_discards_result() {
        let backend = InMemoryBackend::new();
        let expander = CacheExpander::new(backend.clone());
        let calls = AtomicUsize::new(0);
        let policy = Endpoint::CustomerUsers {
            customer_id: 7,
            page: PageRequest::default(),
        }
        .policy(Duration::from_secs(60));

        // A user is added to customer 7 while the listing is being read
        let listing: Doc = expander
            .get_or_compute(&policy, CacheStrategy::Refresh, || async {
                expander
                    .invalidate_tags(&Mutation::UserAdded { customer_id: 7 }.tags())
                    .await
                    .expect("Failed to invalidate");
                Ok::<_, Error>(doc("before-add"))
            })
            .await
            .expect("Failed to compute");
        assert_eq!(listing.data, "before-add");
        assert!(backend.is_empty());

        let next = fetch(&expander, &policy, CacheStrategy::Refresh, &calls, "after-add").await;
        assert_eq!(next.data, "after-add");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let cached = fetch(&expander, &policy, CacheStrategy::Refresh, &calls, "later").await;
        assert_eq!(cached.data, "after-add");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unrelated_write_during_compute_keeps_result() {
        let backend = InMemoryBackend::new();
        let expander = CacheExpander::new(backend.clone());
        let policy = Endpoint::ProductDetail { id: 1 }.policy(Duration::from_secs(60));

        let _: Doc = expander
            .get_or_compute(&policy, CacheStrategy::Refresh, || async {
                expander
                    .invalidate_tags(&Mutation::UserAdded { customer_id: 9 }.tags())
                    .await
                    .expect("Failed to invalidate");
                Ok::<_, Error>(doc("phone"))
            })
            .await
            .expect("Failed to compute");
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_metrics_hits_and_misses() {
        let metrics = Arc::new(AtomicMetrics::new());
        let expander = CacheExpander::new(InMemoryBackend::new())
            .with_metrics(Box::new(Arc::clone(&metrics)));
        let calls = AtomicUsize::new(0);
        let policy = user_policy(1);

        fetch(&expander, &policy, CacheStrategy::Refresh, &calls, "a").await;
        fetch(&expander, &policy, CacheStrategy::Refresh, &calls, "a").await;
        fetch(&expander, &policy, CacheStrategy::Refresh, &calls, "a").await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.hits, 2);
        assert_eq!(snapshot.sets, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_recomputed() {
        let expander = CacheExpander::new(InMemoryBackend::new());
        let calls = AtomicUsize::new(0);
        let policy = CachePolicy {
            ttl: Duration::from_millis(50),
            ..user_policy(2)
        };

        fetch(&expander, &policy, CacheStrategy::Refresh, &calls, "v1").await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        let value = fetch(&expander, &policy, CacheStrategy::Refresh, &calls, "v2").await;

        assert_eq!(value.data, "v2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
