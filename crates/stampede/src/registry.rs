//! Per-key mutex registry used when a backend doesn't supply its own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use stampede_core::RegionMutex;
use tokio::sync::Semaphore;

/// Process-local mutex backing the dogpile lock when the backend has no
/// distributed mutex of its own.
///
/// Built on a one-permit [`Semaphore`] rather than a `tokio::sync::Mutex`
/// because the dogpile lock needs explicit, non-RAII acquire/release: the
/// async-creator hand-off transfers release responsibility to a detached
/// task, which an ordinary guard tied to a stack frame can't express.
/// `try_acquire_owned`/`acquire_owned` hand back an owned permit that is
/// deliberately leaked (`forget`) on success; `release` restores it.
#[derive(Debug)]
pub struct LocalMutex {
    semaphore: Semaphore,
    locked: AtomicBool,
}

impl LocalMutex {
    pub fn new() -> Self {
        Self {
            semaphore: Semaphore::new(1),
            locked: AtomicBool::new(false),
        }
    }
}

impl Default for LocalMutex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegionMutex for LocalMutex {
    async fn try_acquire(&self) -> bool {
        match self.semaphore.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.locked.store(true, Ordering::SeqCst);
                true
            }
            Err(_) => false,
        }
    }

    async fn acquire_blocking(&self) {
        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("semaphore is never closed");
        permit.forget();
        self.locked.store(true, Ordering::SeqCst);
    }

    async fn release(&self) {
        self.semaphore.add_permits(1);
        self.locked.store(false, Ordering::SeqCst);
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }
}

/// Key -> mutex map, memoized for the region's lifetime.
///
/// Concurrent lookups of the same key that hasn't been seen yet race on
/// [`dashmap::DashMap::entry`], which resolves them to a single created
/// mutex; the registry never hands out two different mutex instances for
/// the same key while any reference to the earlier one could still be
/// live.
#[derive(Debug, Default)]
pub struct NameRegistry {
    mutexes: DashMap<String, Arc<dyn RegionMutex>>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self {
            mutexes: DashMap::new(),
        }
    }

    /// Return the mutex for `key`, creating a [`LocalMutex`] on first
    /// access if `backend_mutex` didn't supply one.
    pub fn mutex_for(
        &self,
        key: &str,
        backend_mutex: Option<Arc<dyn RegionMutex>>,
    ) -> Arc<dyn RegionMutex> {
        if let Some(entry) = self.mutexes.get(key) {
            return entry.clone();
        }

        let mutex = backend_mutex.unwrap_or_else(|| Arc::new(LocalMutex::new()));
        self.mutexes
            .entry(key.to_string())
            .or_insert(mutex)
            .clone()
    }

    /// Whether `key` currently has a registered, held mutex.
    pub fn is_locked(&self, key: &str) -> bool {
        self.mutexes
            .get(key)
            .map(|m| m.is_locked())
            .unwrap_or(false)
    }

    /// Drop registry entries whose mutex is held only by this map.
    ///
    /// The registry is otherwise unbounded: it remembers every key ever
    /// looked up for the region's lifetime. This is the escape hatch for
    /// long-lived regions with high key cardinality; it is never called
    /// automatically.
    pub fn prune_unheld_mutexes(&self) {
        self.mutexes
            .retain(|_, mutex| Arc::strong_count(mutex) > 1 || mutex.is_locked());
    }

    pub fn len(&self) -> usize {
        self.mutexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutexes.is_empty()
    }
}
