//! In-memory cache backend (default, thread-safe, async).
//!
//! Uses DashMap for lock-free concurrent access with per-key sharding.
//! Expired entries are dropped when read, on every tag invalidation, and by
//! a sweep every [`SWEEP_INTERVAL`] writes.

use super::{CacheBackend, TagVersion};
use crate::error::Result;
use crate::key::{Tag, TagSet};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

/// Number of writes between two sweeps of expired entries.
pub const SWEEP_INTERVAL: u64 = 1024;

/// In-memory cache entry with optional expiration and its dependency tags.
struct CacheEntry {
    data: Vec<u8>,
    tags: TagSet,
    expires_at: Option<Instant>,
    serial: u64,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Option<Duration>, tags: TagSet, serial: u64) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        CacheEntry {
            data,
            tags,
            expires_at,
            serial,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// Thread-safe async in-memory cache backend.
///
/// Clones share the same store.
///
/// # Example
///
/// ```
/// use catalog_api::backend::{CacheBackend, InMemoryBackend};
/// use catalog_api::key::{Tag, TagSet};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> catalog_api::Result<()> {
/// let backend = InMemoryBackend::new();
/// let tags: TagSet = [Tag::users(), Tag::user(5)].into();
///
/// backend
///     .set("user_5", b"payload".to_vec(), Some(Duration::from_secs(60)), &tags)
///     .await?;
/// assert!(backend.get("user_5").await?.is_some());
///
/// backend.invalidate_tags(&[Tag::user(5)].into()).await?;
/// assert!(backend.get("user_5").await?.is_none());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, CacheEntry>>,
    // One counter per tag ever invalidated.
    versions: Arc<DashMap<Tag, u64>>,
    writes: Arc<AtomicU64>,
}

impl InMemoryBackend {
    /// Create a new in-memory cache backend.
    pub fn new() -> Self {
        InMemoryBackend {
            store: Arc::new(DashMap::new()),
            versions: Arc::new(DashMap::new()),
            writes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of stored entries, including expired ones not yet dropped.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Get memory statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            total_entries: 0,
            expired_entries: 0,
            total_bytes: 0,
        };
        for entry in self.store.iter() {
            stats.total_entries += 1;
            stats.total_bytes += entry.data.len();
            if entry.is_expired() {
                stats.expired_entries += 1;
            }
        }
        stats
    }

    /// Drop every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut purged = 0;
        self.store.retain(|_, entry| {
            if entry.is_expired() {
                purged += 1;
                false
            } else {
                true
            }
        });
        if purged > 0 {
            debug!("✓ InMemory PURGE -> {} expired entries dropped", purged);
        }
        purged
    }

    fn version_of(&self, tags: &TagSet) -> TagVersion {
        let sum = tags
            .iter()
            .filter_map(|tag| self.versions.get(tag).map(|v| *v))
            .fold(0u64, u64::wrapping_add);
        TagVersion(sum)
    }

    /// Insert an entry and return its serial.
    fn insert(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>, tags: &TagSet) -> u64 {
        let serial = self.writes.fetch_add(1, Ordering::Relaxed);
        if (serial + 1) % SWEEP_INTERVAL == 0 {
            self.purge_expired();
        }

        let entry = CacheEntry::new(value, ttl, tags.clone(), serial);
        self.store.insert(key.to_string(), entry);

        if let Some(d) = ttl {
            debug!("✓ InMemory SET {} (TTL: {:?}, {} tags)", key, d, tags.len());
        } else {
            debug!("✓ InMemory SET {} ({} tags)", key, tags.len());
        }
        serial
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.store.get(key) {
            if !entry.is_expired() {
                debug!("✓ InMemory GET {} -> HIT", key);
                return Ok(Some(entry.data.clone()));
            }
        }

        // Drop the expired entry, unless a fresh one replaced it meanwhile.
        self.store.remove_if(key, |_, entry| entry.is_expired());
        debug!("✓ InMemory GET {} -> MISS", key);
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        tags: &TagSet,
    ) -> Result<()> {
        self.insert(key, value, ttl, tags);
        Ok(())
    }

    async fn set_if_current(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        tags: &TagSet,
        version: TagVersion,
    ) -> Result<bool> {
        if self.version_of(tags) != version {
            debug!("InMemory SET {} skipped: tags invalidated", key);
            return Ok(false);
        }

        let serial = self.insert(key, value, ttl, tags);

        // An invalidation bumps versions before removing entries: if it
        // started after the check above, either this re-check sees the bump
        // or its removal pass sees our entry.
        if self.version_of(tags) != version {
            self.store.remove_if(key, |_, entry| entry.serial == serial);
            debug!("InMemory SET {} withdrawn: tags invalidated", key);
            return Ok(false);
        }
        Ok(true)
    }

    async fn tag_version(&self, tags: &TagSet) -> Result<TagVersion> {
        Ok(self.version_of(tags))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key);
        debug!("✓ InMemory DELETE {}", key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        if let Some(entry) = self.store.get(key) {
            return Ok(!entry.is_expired());
        }

        Ok(false)
    }

    async fn invalidate_tags(&self, tags: &TagSet) -> Result<usize> {
        for tag in tags {
            *self.versions.entry(tag.clone()).or_insert(0) += 1;
        }

        let mut removed = 0;
        let mut expired = 0;
        self.store.retain(|_, entry| {
            if !entry.tags.is_disjoint(tags) {
                removed += 1;
                false
            } else if entry.is_expired() {
                expired += 1;
                false
            } else {
                true
            }
        });

        debug!(
            "✓ InMemory INVALIDATE {:?} -> {} entries removed ({} expired dropped)",
            tags.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            removed,
            expired
        );
        Ok(removed)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn clear_all(&self) -> Result<()> {
        self.store.clear();
        warn!("⚠ InMemory CLEAR_ALL executed - all cache cleared!");
        Ok(())
    }
}

/// Cache statistics.
#[derive(Clone, Debug)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub total_bytes: usize,
}
