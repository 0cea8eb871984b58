//! Write-path cache invalidation.
//!
//! Handlers call [`Invalidator::invalidate`] after the repository has
//! committed a mutation and before building the response, so a client that
//! reads after receiving the response never sees the pre-mutation entry.

use crate::backend::CacheBackend;
use crate::key::Mutation;
use crate::service::CacheService;

/// Evicts the cached reads affected by a committed mutation.
pub struct Invalidator<B: CacheBackend> {
    cache: CacheService<B>,
}

impl<B: CacheBackend> Clone for Invalidator<B> {
    fn clone(&self) -> Self {
        Invalidator {
            cache: self.cache.clone(),
        }
    }
}

impl<B: CacheBackend> Invalidator<B> {
    pub fn new(cache: CacheService<B>) -> Self {
        Invalidator { cache }
    }

    /// Invalidate every tag `mutation` affects.
    ///
    /// The mutation is already durable, so a failing backend does not fail
    /// the request: the error is logged and counted, and entries left
    /// behind expire with their TTL. Returns the number of removed entries.
    pub async fn invalidate(&self, mutation: Mutation) -> usize {
        let tags = mutation.tags();
        match self.cache.invalidate_tags(&tags).await {
            Ok(removed) => {
                info!("Invalidated {} cache entries after {:?}", removed, mutation);
                removed
            }
            Err(e) => {
                error!(
                    "Cache invalidation failed after {:?}, stale entries may be served until TTL: {}",
                    mutation, e
                );
                0
            }
        }
    }
}
