//! stampede-core: foundational types and traits for the stampede dogpile
//! cache region.
//!
//! A region coordinates regeneration of cached values so that, for a
//! given key, at most one caller regenerates a missing or stale value
//! while concurrent callers either block or are served a stale value.
//! This crate defines the vocabulary that pattern is built from: the
//! value envelope, the byte-oriented backend contract, the pluggable
//! serializer, the invalidation strategy, and the per-key mutex
//! abstraction. The coordination algorithm itself lives in the
//! `stampede` crate.

mod envelope;
mod error;
mod traits;
mod wire;

pub use envelope::{CacheReturn, Metadata, CURRENT_SCHEMA_VERSION, Envelope};
pub use error::{CacheError, Result};
pub use traits::*;
pub use wire::{decode, encode};
