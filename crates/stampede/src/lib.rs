//! stampede: a dogpile-lock cache region for Rust.
//!
//! A [`CacheRegion`] sits in front of a pluggable [`CacheBackend`] and
//! coordinates value regeneration so that, for any key, at most one
//! caller regenerates a stale or missing value while concurrent callers
//! either block or are served a stale value during the regeneration
//! ("dogpile lock" / stampede prevention / request coalescing).
//!
//! # Quick start
//!
//! ```rust,no_run
//! use stampede::{CacheRegion, ExpirationOverride, RegionConfig};
//! use stampede_core::CacheReturn;
//! use stampede_memory::MemoryBackend;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> stampede_core::Result<()> {
//!     let region: CacheRegion<MemoryBackend> = CacheRegion::new();
//!     region.configure(
//!         MemoryBackend::new(),
//!         RegionConfig::new().with_expiration_time(Duration::from_secs(60)),
//!     )?;
//!
//!     let value = region
//!         .get_or_create(
//!             "expensive-key",
//!             || async { Ok(42i32) },
//!             ExpirationOverride::UseRegionDefault,
//!             None,
//!         )
//!         .await?;
//!
//!     match value {
//!         CacheReturn::Value(env) => println!("got {}", env.payload),
//!         CacheReturn::NoValue => println!("no value"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod dogpile;
pub mod proxy;
pub mod region;
pub mod registry;

pub use dogpile::{get_or_create as dogpile_get_or_create, tokio_spawner, Spawner};
pub use region::{CacheRegion, ExpirationOverride, ExpirationTimeProvider, KeyMangler, RegionConfig};
pub use registry::{LocalMutex, NameRegistry};

pub use stampede_core::*;

#[cfg(test)]
mod tests;
