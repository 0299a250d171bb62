use crate::{CacheMetrics, CacheOperation};
use std::time::Duration;
use tracing::debug;

/// Metrics adapter that logs dogpile-lock events via `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingMetrics {
    /// Region name/prefix (optional)
    region_name: Option<String>,
}

impl TracingMetrics {
    /// Create new tracing metrics adapter
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a region name prefix
    pub fn with_region_name(mut self, name: impl Into<String>) -> Self {
        self.region_name = Some(name.into());
        self
    }
}

impl CacheMetrics for TracingMetrics {
    fn record_hit(&self, key: &str) {
        debug!(
            target: "stampede",
            event = "hit",
            key = %key,
            region = ?self.region_name,
            "cache hit"
        );
    }

    fn record_miss(&self, key: &str) {
        debug!(
            target: "stampede",
            event = "miss",
            key = %key,
            region = ?self.region_name,
            "cache miss"
        );
    }

    fn record_stale_serve(&self, key: &str) {
        debug!(
            target: "stampede",
            event = "stale_serve",
            key = %key,
            region = ?self.region_name,
            "serving stale value while regenerating"
        );
    }

    fn record_regenerate(&self, key: &str, duration: Duration, succeeded: bool) {
        debug!(
            target: "stampede",
            event = "regenerate",
            key = %key,
            duration_ms = duration.as_millis(),
            succeeded,
            region = ?self.region_name,
            "value regenerated"
        );
    }

    fn record_invalidate(&self, hard: bool) {
        debug!(
            target: "stampede",
            event = "invalidate",
            hard,
            region = ?self.region_name,
            "region invalidated"
        );
    }

    fn record_latency(&self, operation: CacheOperation, duration: Duration) {
        tracing::trace!(
            target: "stampede",
            event = "latency",
            operation = ?operation,
            duration_ms = duration.as_millis(),
            region = ?self.region_name,
            "operation latency"
        );
    }
}
