//! Per-key mutex abstraction used by the dogpile lock.

use async_trait::async_trait;

/// One logical mutex per cache key.
///
/// Acquisition and release are explicit rather than RAII-guarded: the
/// dogpile lock sometimes hands release responsibility to a detached
/// background task (the async-creator path), which an ordinary guard
/// tied to a stack frame can't express.
#[async_trait]
pub trait RegionMutex: Send + Sync {
    /// Attempt to acquire without blocking. Returns whether it succeeded.
    async fn try_acquire(&self) -> bool;

    /// Block until the mutex can be acquired.
    async fn acquire_blocking(&self);

    /// Release a mutex previously acquired by this caller.
    async fn release(&self);

    /// Whether the mutex is currently held by anyone.
    fn is_locked(&self) -> bool;
}
