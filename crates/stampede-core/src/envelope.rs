//! Value envelope: a cached payload plus the metadata that has to survive
//! a round trip through a byte-oriented backend.

use serde::{Deserialize, Serialize};

/// Schema version stamped onto every envelope this crate writes.
///
/// A region never returns or deserializes an envelope whose `v` differs
/// from this constant — it's treated exactly like a miss, which lets a
/// schema change roll out without an explicit cache flush: old entries
/// simply age out and get overwritten.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Metadata carried alongside a cached payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Creation time, seconds since the Unix epoch.
    pub ct: f64,
    /// Schema version this envelope was written with.
    pub v: u32,
}

/// A cached payload plus its metadata.
#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub metadata: Metadata,
}

impl<T> Envelope<T> {
    /// Wrap `payload`, stamping it with the current time and schema
    /// version.
    pub fn wrap(payload: T, ct: f64) -> Self {
        Self {
            payload,
            metadata: Metadata {
                ct,
                v: CURRENT_SCHEMA_VERSION,
            },
        }
    }

    pub fn is_current_version(&self) -> bool {
        self.metadata.v == CURRENT_SCHEMA_VERSION
    }

    /// Age of this envelope relative to `now`, clamped at zero (a clock
    /// that moved backward between write and read never produces a
    /// negative age).
    pub fn age_secs(&self, now: f64) -> f64 {
        (now - self.metadata.ct).max(0.0)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            payload: f(self.payload),
            metadata: self.metadata,
        }
    }
}

/// Result of a cache lookup: either nothing is cached for the key, or an
/// envelope is.
///
/// This is deliberately not `Option<T>` — the payload itself may be
/// legitimately absent-shaped (`None`, `()`, an empty collection), and
/// conflating "nothing was ever cached here" with "a value was cached
/// and it happens to be empty" would make negative caching impossible to
/// express correctly.
#[derive(Debug, Clone)]
pub enum CacheReturn<T> {
    Value(Envelope<T>),
    NoValue,
}

impl<T> CacheReturn<T> {
    pub fn is_value(&self) -> bool {
        matches!(self, CacheReturn::Value(_))
    }

    pub fn is_no_value(&self) -> bool {
        matches!(self, CacheReturn::NoValue)
    }

    /// Discard the metadata and return just the payload, if any.
    pub fn into_payload(self) -> Option<T> {
        match self {
            CacheReturn::Value(env) => Some(env.payload),
            CacheReturn::NoValue => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_stamps_current_version() {
        let env = Envelope::wrap("hello", 1000.0);
        assert!(env.is_current_version());
        assert_eq!(env.metadata.ct, 1000.0);
    }

    #[test]
    fn age_never_negative() {
        let env = Envelope::wrap("v", 1000.0);
        assert_eq!(env.age_secs(900.0), 0.0);
        assert_eq!(env.age_secs(1010.0), 10.0);
    }

    #[test]
    fn cache_return_distinguishes_no_value_from_empty_value() {
        let empty: CacheReturn<Option<String>> = CacheReturn::Value(Envelope::wrap(None, 0.0));
        let absent: CacheReturn<Option<String>> = CacheReturn::NoValue;

        assert!(empty.is_value());
        assert!(absent.is_no_value());
        assert_eq!(empty.into_payload(), Some(None));
        assert_eq!(absent.into_payload(), None);
    }
}
