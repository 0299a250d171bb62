//! Core traits for region operation: storage, serialization,
//! invalidation, mutual exclusion, and observability.

mod backend;
mod invalidation;
mod metrics;
mod mutex;
mod serializer;

pub use backend::{CacheBackend, ProxyBackend};
pub use invalidation::{DefaultInvalidator, InvalidationMode, RegionInvalidator};
pub use metrics::{CacheMetrics, CacheOperation, NoopMetrics};
pub use mutex::RegionMutex;
pub use serializer::{JsonSerializer, Serializer};

#[cfg(feature = "msgpack")]
pub use serializer::MsgPackSerializer;

#[cfg(feature = "bincode")]
pub use serializer::BincodeSerializer;

#[cfg(feature = "tracing")]
mod tracing;
#[cfg(feature = "tracing")]
pub use tracing::TracingMetrics;
