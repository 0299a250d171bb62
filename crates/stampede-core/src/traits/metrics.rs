//! Metrics trait for region observability

use std::time::Duration;

/// Operation kind for latency tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOperation {
    Get,
    Set,
    Delete,
    Generate,
    Invalidate,
}

impl CacheOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOperation::Get => "get",
            CacheOperation::Set => "set",
            CacheOperation::Delete => "delete",
            CacheOperation::Generate => "generate",
            CacheOperation::Invalidate => "invalidate",
        }
    }
}

/// Trait for region observability.
///
/// Implement this to integrate with a metrics system (Prometheus,
/// StatsD, ...). The events correspond to the dogpile lock's outcomes,
/// not to a particular backend's internals: a fresh hit, a miss that
/// triggers regeneration, a stale value served while another caller
/// regenerates in the background, and an invalidation call.
pub trait CacheMetrics: Send + Sync + 'static {
    /// A fresh, unexpired value was returned without acquiring the mutex.
    fn record_hit(&self, key: &str);

    /// No usable value existed; the caller is about to regenerate (or
    /// block on someone else regenerating).
    fn record_miss(&self, key: &str);

    /// A stale value was returned while a background regeneration is (or
    /// becomes) in flight.
    fn record_stale_serve(&self, key: &str);

    /// A regeneration (creator call) completed, successfully or not.
    fn record_regenerate(&self, key: &str, duration: Duration, succeeded: bool);

    /// `invalidate` was called on the region.
    fn record_invalidate(&self, hard: bool);

    /// Generic operation latency, for operations that don't fit the
    /// dogpile-specific events above (`set`, `delete`, ...).
    fn record_latency(&self, operation: CacheOperation, duration: Duration);
}

/// No-op metrics implementation (default). Zero overhead when metrics
/// aren't needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl CacheMetrics for NoopMetrics {
    #[inline]
    fn record_hit(&self, _key: &str) {}

    #[inline]
    fn record_miss(&self, _key: &str) {}

    #[inline]
    fn record_stale_serve(&self, _key: &str) {}

    #[inline]
    fn record_regenerate(&self, _key: &str, _duration: Duration, _succeeded: bool) {}

    #[inline]
    fn record_invalidate(&self, _hard: bool) {}

    #[inline]
    fn record_latency(&self, _operation: CacheOperation, _duration: Duration) {}
}
