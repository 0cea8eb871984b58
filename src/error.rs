//! Error types for the cache and data-access layers.
//!
//! HTTP-facing errors live in [`crate::http::error`]; this type is what the
//! cache store, the repositories and configuration loading return.

use std::fmt;

/// Result type for cache, repository and configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the cache and persistence layers.
#[derive(Debug, Clone)]
pub enum Error {
    /// Serialization failed when converting a payload to cache bytes.
    ///
    /// Common causes:
    /// - Payload contains non-serializable types
    /// - Postcard codec error
    SerializationError(String),

    /// Deserialization failed when converting cache bytes to a payload.
    ///
    /// **Recovery:** the entry is evicted and recomputed on the next read.
    DeserializationError(String),

    /// Cache backend storage error (Redis unavailable, protocol error, ...).
    ///
    /// **Recovery:** reads fail open and fall back to the repository.
    BackendError(String),

    /// Data repository error (database unreachable, query failure, ...).
    RepositoryError(String),

    /// A write violated a uniqueness constraint (duplicate email, reference
    /// or customer name).
    Conflict(String),

    /// Configuration error during startup.
    ///
    /// Raised for unparsable environment values or an unsupported backend
    /// selection.
    ConfigError(String),

    /// Feature not implemented or not enabled.
    ///
    /// **Recovery:** enable the required Cargo feature (`redis`, `postgres`).
    NotImplemented(String),

    /// Invalid cache entry: corrupted envelope or bad magic.
    InvalidCacheEntry(String),

    /// Schema version mismatch between code and cached data.
    ///
    /// Expected during deployments that change a cached document shape; the
    /// entry is evicted and recomputed.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from cached entry)
        found: u32,
    },

    /// Generic error with custom message.
    Other(String),
}

impl Error {
    /// True for errors caused by cached bytes that cannot be decoded.
    ///
    /// Such entries are evicted instead of being served.
    pub fn is_corrupt_entry(&self) -> bool {
        matches!(
            self,
            Error::DeserializationError(_)
                | Error::InvalidCacheEntry(_)
                | Error::VersionMismatch { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
            Error::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
            Error::InvalidCacheEntry(msg) => {
                write!(f, "Invalid cache entry: {}", msg)
            }
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Cache version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::BackendError(e.to_string())
        } else if e.is_syntax() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::BackendError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::BackendError(format!("Redis error: {}", e))
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Conflict(db.message().to_string())
            }
            _ => Error::RepositoryError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Conflict("email taken".to_string());
        assert_eq!(err.to_string(), "Conflict: email taken");
    }

    #[test]
    fn test_error_from_string() {
        let err: Error = "test error".into();
        assert!(matches!(err, Error::Other(_)));
    }

    #[test]
    fn test_corrupt_entry_classification() {
        assert!(Error::InvalidCacheEntry("magic".into()).is_corrupt_entry());
        assert!(Error::VersionMismatch {
            expected: 1,
            found: 2
        }
        .is_corrupt_entry());
        assert!(!Error::BackendError("down".into()).is_corrupt_entry());
    }
}
