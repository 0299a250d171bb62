//! The dogpile lock: the coordination algorithm that decides, for a given
//! key, whether a caller gets a value without acquiring anything, becomes
//! the regenerator, or is served a stale value while someone else
//! regenerates.
//!
//! This module knows nothing about backends, serialization, or the
//! region's public API — it operates purely in terms of [`ValueSource`]
//! (how to read the current state for a key) and [`ValueGenerator`] (how
//! to produce a fresh value). The region wires the wire-format pipeline
//! into both.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use stampede_core::{CacheReturn, Envelope, RegionMutex, Result};

/// What [`ValueSource::get_value`] found for a key.
///
/// `Regenerate` folds together "nothing cached", "hard-invalidated", and
/// "schema version mismatch" — the dogpile lock treats all three
/// identically (infinitely stale, forcing the cold-miss branch), so there
/// is no value in distinguishing them past this point.
#[derive(Debug)]
pub enum GetValueOutcome<T> {
    /// Unexpired, usable as-is. No mutex is ever acquired for this case.
    Fresh(Envelope<T>),
    /// Expired or soft-invalidated, but still returnable while a
    /// regeneration is attempted or already in flight.
    Stale(Envelope<T>),
    /// No usable value exists at all.
    Regenerate,
}

/// Reads the current cached state for one key.
#[async_trait]
pub trait ValueSource<T>: Send + Sync {
    async fn get_value(&self) -> Result<GetValueOutcome<T>>;
}

/// Produces a fresh value for one key.
///
/// Takes `self: Box<Self>` because a generator is consumed exactly once,
/// whether it runs synchronously in the caller's task or is handed off to
/// a detached one.
#[async_trait]
pub trait ValueGenerator<T>: Send {
    async fn generate(self: Box<Self>) -> Result<Envelope<T>>;
}

/// Marks that release responsibility for a mutex has been transferred to
/// a detached task.
///
/// Every acquired mutex has a matching release on every code path in this
/// module except one: when a caller hands regeneration off to an
/// async-creator runner, the runner — not `get_or_create`'s caller — is
/// responsible for releasing. This newtype makes that transfer visible at
/// the call site; it is a documentation device, not a type-system
/// enforcement (the underlying `Arc<dyn RegionMutex>` can still be
/// released or dropped by anyone holding a clone).
pub struct MutexGuardHandle(pub Arc<dyn RegionMutex>);

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A function that runs a detached regeneration, e.g. by handing it to
/// `tokio::spawn`. The region never spawns tasks on its own initiative
/// outside of this hook.
pub type Spawner = Arc<dyn Fn(BoxFuture) + Send + Sync>;

/// The reference `tokio`-backed spawner the crate ships for convenience.
pub fn tokio_spawner() -> Spawner {
    Arc::new(|fut: BoxFuture| {
        tokio::spawn(fut);
    })
}

async fn run_detached<T>(handle: MutexGuardHandle, generator: Box<dyn ValueGenerator<T>>)
where
    T: Send + 'static,
{
    let _ = generator.generate().await;
    handle.0.release().await;
}

/// Run the dogpile-lock protocol for a single key.
///
/// `mutex` is the per-key mutex (from the region's [`stampede_core`]
/// mutex registry), `source` reads the current state, `make_generator`
/// lazily builds the thing that produces a fresh value (only invoked on
/// the branches that actually need to regenerate), and `spawner`, when
/// present, hands regeneration off to a detached task instead of running
/// it inline — the caller is served the stale value immediately and
/// never observes the regeneration's outcome.
pub async fn get_or_create<T>(
    mutex: Arc<dyn RegionMutex>,
    source: &(dyn ValueSource<T> + '_),
    make_generator: impl FnOnce() -> Box<dyn ValueGenerator<T>>,
    spawner: Option<&Spawner>,
) -> Result<CacheReturn<T>>
where
    T: Send + 'static,
{
    match source.get_value().await? {
        GetValueOutcome::Fresh(env) => Ok(CacheReturn::Value(env)),

        GetValueOutcome::Stale(stale_env) => {
            if mutex.try_acquire().await {
                match spawner {
                    Some(spawn) => {
                        let generator = make_generator();
                        let handle = MutexGuardHandle(mutex.clone());
                        spawn(Box::pin(run_detached(handle, generator)));
                        Ok(CacheReturn::Value(stale_env))
                    }
                    None => {
                        let result = make_generator().generate().await;
                        mutex.release().await;
                        result.map(CacheReturn::Value)
                    }
                }
            } else {
                // Someone else already holds the lock; dogpile prevention:
                // serve what we have rather than piling onto the regenerator.
                Ok(CacheReturn::Value(stale_env))
            }
        }

        GetValueOutcome::Regenerate => {
            if mutex.try_acquire().await {
                let result = make_generator().generate().await;
                mutex.release().await;
                result.map(CacheReturn::Value)
            } else {
                mutex.acquire_blocking().await;
                let refreshed = source.get_value().await;
                mutex.release().await;
                match refreshed? {
                    GetValueOutcome::Fresh(env) | GetValueOutcome::Stale(env) => {
                        Ok(CacheReturn::Value(env))
                    }
                    // The winner regenerated and then something else (e.g.
                    // a concurrent hard invalidate) wiped it out again.
                    GetValueOutcome::Regenerate => Ok(CacheReturn::NoValue),
                }
            }
        }
    }
}
