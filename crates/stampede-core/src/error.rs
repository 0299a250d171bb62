//! Error types for cache region operations

use thiserror::Error;

/// Main error type for all region operations
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// `configure` called on a region that is already configured, without
    /// the `replace_existing_backend` flag.
    #[error("region is already configured")]
    RegionAlreadyConfigured,

    /// Any operation attempted before `configure` has run.
    #[error("region is not configured")]
    RegionNotConfigured,

    /// A configuration value (expiration, proxy chain, ...) was invalid.
    #[error("invalid configuration: {0}")]
    ValidationError(String),

    /// A proxy passed to `wrap` did not satisfy the proxy contract.
    #[error("invalid proxy: {0}")]
    InvalidProxy(String),

    /// Soft invalidation was requested/observed at a call site with no
    /// expiration time in effect; soft invalidation has nothing to make
    /// the value stale relative to.
    #[error("soft invalidation requires an expiration time")]
    SoftInvalidationNeedsExpiration,

    /// The deserializer reported the payload bytes don't match the type
    /// being requested. Recovered locally by the region: treated exactly
    /// like a miss, never surfaced to the caller.
    #[error("cannot deserialize cached value: {0}")]
    CannotDeserialize(String),

    /// Serialization of an outgoing value failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The envelope itself (not the payload) was corrupt.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The backend reported a failure performing an I/O operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// The creator function supplied to `get_or_create` failed.
    #[error("creator function failed: {0}")]
    Creator(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for region operations
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::RegionNotConfigured;
        assert_eq!(err.to_string(), "region is not configured");

        let err = CacheError::CannotDeserialize("schema drift".to_string());
        assert_eq!(
            err.to_string(),
            "cannot deserialize cached value: schema drift"
        );
    }

    #[test]
    fn test_error_clone() {
        let err = CacheError::SoftInvalidationNeedsExpiration;
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
