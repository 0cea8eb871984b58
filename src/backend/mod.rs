//! Cache backend implementations.

use crate::error::Result;
use crate::key::TagSet;
use std::future::Future;
use std::time::Duration;

pub mod inmemory;
#[cfg(feature = "redis")]
pub mod redis;

pub use inmemory::{CacheStats, InMemoryBackend};
#[cfg(feature = "redis")]
pub use redis::{RedisBackend, RedisConfig};

/// Combined invalidation counter of a tag set.
///
/// Taken before a value is computed and handed back to
/// [`CacheBackend::set_if_current`]; an invalidation of any of the tags in
/// between turns the store into a no-op.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TagVersion(pub u64);

/// Tag-aware key/value storage for cached responses.
///
/// Every entry carries the set of tags it depends on; `invalidate_tags`
/// removes all entries sharing at least one tag with the given set.
///
/// **IMPORTANT:** All methods take `&self`. Implementations use interior
/// mutability (DashMap shards, a connection pool).
///
/// **ASYNC:** Methods return `Send` futures so they can be awaited from axum
/// handlers that are generic over the backend. Implementations can still be
/// written as `async fn`.
pub trait CacheBackend: Send + Sync + Clone + 'static {
    /// Retrieve value from cache by key.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` - Value found and not expired
    /// - `Ok(None)` - Cache miss
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs (connection lost, etc.)
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Store value in cache, replacing any previous entry for `key`.
    ///
    /// # Arguments
    /// - `key`: Cache key
    /// - `value`: Serialized payload bytes
    /// - `ttl`: Time-to-live. None = never expires
    /// - `tags`: Tags the entry depends on
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        tags: &TagSet,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Store like [`set`](Self::set), unless one of `tags` was invalidated
    /// after `version` was taken.
    ///
    /// # Returns
    /// `true` when the entry was stored.
    fn set_if_current(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        tags: &TagSet,
        version: TagVersion,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Current version of `tags`. Every `invalidate_tags` call touching one of
    /// them changes it.
    fn tag_version(&self, tags: &TagSet) -> impl Future<Output = Result<TagVersion>> + Send;

    /// Remove value from cache.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Check if a live entry exists for `key`.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send {
        async move {
            let found: Result<bool> = self.get(key).await.map(|value| value.is_some());
            found
        }
    }

    /// Remove every entry whose tag set intersects `tags`.
    ///
    /// Versions of `tags` are bumped before entries are removed, so a value
    /// computed before the call can no longer be stored with
    /// `set_if_current`. When this returns `Ok`, later reads of those entries
    /// miss.
    ///
    /// # Returns
    /// Number of entries removed.
    fn invalidate_tags(&self, tags: &TagSet) -> impl Future<Output = Result<usize>> + Send;

    /// Health check - verify backend is accessible.
    ///
    /// Reported by the `/health` endpoint.
    fn health_check(&self) -> impl Future<Output = Result<bool>> + Send {
        let healthy: Result<bool> = Ok(true);
        async move { healthy }
    }

    /// Optional: Clear all cache (use with caution).
    ///
    /// # Errors
    /// Returns `Err` if operation is not implemented or fails
    fn clear_all(&self) -> impl Future<Output = Result<()>> + Send {
        let result: Result<()> = Err(crate::error::Error::NotImplemented(
            "clear_all not implemented for this backend".to_string(),
        ));
        async move { result }
    }
}
