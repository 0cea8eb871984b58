//! Cache strategies for read operations.
//!
//! Enum-based strategy instead of boolean flags, so the cache behavior of a
//! request is explicit.
//!
//! | Strategy | Cache Hit | Cache Miss | Use Case |
//! |----------|-----------|-----------|----------|
//! | **Refresh** | Return | Compute + store | Default |
//! | **Bypass** | Ignore | Compute only | Caching disabled by configuration |
//!
//! ```
//! use catalog_api::strategy::CacheStrategy;
//!
//! assert_eq!(CacheStrategy::default(), CacheStrategy::Refresh);
//! assert_eq!(CacheStrategy::for_enabled(false), CacheStrategy::Bypass);
//! ```

/// Strategy enum controlling cache lookup behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheStrategy {
    /// **Refresh**: Try cache first, compute on miss.
    ///
    /// Flow:
    /// 1. Check cache
    /// 2. If hit: return cached value
    /// 3. If miss: compute from the repository
    /// 4. Store in cache
    /// 5. Return value
    #[default]
    Refresh,

    /// **Bypass**: Never read or write the cache, always compute.
    Bypass,
}

impl CacheStrategy {
    /// Strategy matching the `CACHE_ENABLED` setting.
    pub fn for_enabled(enabled: bool) -> Self {
        if enabled {
            CacheStrategy::Refresh
        } else {
            CacheStrategy::Bypass
        }
    }

    /// Whether lookups read and populate the cache.
    pub fn uses_cache(&self) -> bool {
        matches!(self, CacheStrategy::Refresh)
    }
}

impl std::fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStrategy::Refresh => write!(f, "Refresh"),
            CacheStrategy::Bypass => write!(f, "Bypass"),
        }
    }
}
