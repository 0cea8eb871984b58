//! Trait implemented by every value stored in the response cache.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A value that can be stored in the response cache.
///
/// Implemented by the response documents in [`crate::document`]. The cache
/// key and tags are not part of the payload: they are derived from the
/// endpoint that produced it (see [`crate::key`]).
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use catalog_api::CachePayload;
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Banner {
///     text: String,
/// }
///
/// impl CachePayload for Banner {}
///
/// let bytes = Banner { text: "hi".into() }.serialize_for_cache().unwrap();
/// assert_eq!(Banner::deserialize_from_cache(&bytes).unwrap().text, "hi");
/// ```
pub trait CachePayload: Send + Sync + Serialize + DeserializeOwned + Clone + 'static {
    /// Serialize the payload for cache storage.
    ///
    /// Uses the versioned Postcard envelope from [`crate::serialization`].
    fn serialize_for_cache(&self) -> Result<Vec<u8>> {
        crate::serialization::serialize_for_cache(self)
    }

    /// Deserialize a payload from cache storage.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidCacheEntry`: bad magic or corrupted envelope
    /// - `Error::VersionMismatch`: schema version changed
    /// - `Error::DeserializationError`: corrupted payload
    fn deserialize_from_cache(bytes: &[u8]) -> Result<Self> {
        crate::serialization::deserialize_from_cache(bytes)
    }

    /// Optional: validate the payload after it was read back from cache.
    ///
    /// A failing payload is evicted and recomputed.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde::Deserialize;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        hits: u64,
    }

    impl CachePayload for Counter {
        fn validate(&self) -> Result<()> {
            if self.hits == u64::MAX {
                return Err(Error::InvalidCacheEntry("saturated".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_serialize_deserialize() {
        let bytes = Counter { hits: 3 }.serialize_for_cache().unwrap();
        let back = Counter::deserialize_from_cache(&bytes).unwrap();
        assert_eq!(back, Counter { hits: 3 });
    }

    #[test]
    fn test_validate_hook() {
        assert!(Counter { hits: 1 }.validate().is_ok());
        assert!(Counter { hits: u64::MAX }.validate().is_err());
    }
}
