//! Region-level invalidation strategy: an in-process timestamp barrier.

use parking_lot::RwLock;

/// Whether an `invalidate` call was hard or soft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationMode {
    /// Every envelope older than the barrier is treated as a miss —
    /// forces the cold-miss path, all waiters block on regeneration.
    Hard,
    /// Envelopes older than the barrier are still returned to callers
    /// that can't become the regenerator, but the dogpile lock treats
    /// them as stale and attempts regeneration.
    Soft,
}

/// Strategy deciding whether a given creation time is invalidated.
///
/// `DefaultInvalidator` holds the barrier in-process; an embedder that
/// needs cross-process invalidation supplies their own implementation
/// backed by shared storage (left out of this crate's scope — see
/// `CacheBackend` for the storage boundary it would use).
pub trait RegionInvalidator: Send + Sync {
    /// Move the barrier to `now`, in the given mode. Replaces whatever
    /// barrier was previously in effect.
    fn invalidate(&self, hard: bool, now: f64);

    /// Whether `ct` falls behind the barrier, in either mode.
    fn is_invalidated(&self, ct: f64) -> bool;

    /// Whether `ct` falls behind a *hard* barrier.
    fn is_hard_invalidated(&self, ct: f64) -> bool;

    /// Whether `ct` falls behind a *soft* barrier.
    fn is_soft_invalidated(&self, ct: f64) -> bool;

    /// Whether the most recent `invalidate` call was hard.
    fn was_hard_invalidated(&self) -> bool;

    /// Whether the most recent `invalidate` call was soft.
    fn was_soft_invalidated(&self) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
struct Barrier {
    time: Option<f64>,
    mode: Option<InvalidationMode>,
}

/// In-process barrier, replaced wholesale on every `invalidate` call.
#[derive(Debug, Default)]
pub struct DefaultInvalidator {
    barrier: RwLock<Barrier>,
}

impl DefaultInvalidator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegionInvalidator for DefaultInvalidator {
    fn invalidate(&self, hard: bool, now: f64) {
        let mut barrier = self.barrier.write();
        barrier.time = Some(now);
        barrier.mode = Some(if hard {
            InvalidationMode::Hard
        } else {
            InvalidationMode::Soft
        });
    }

    fn is_invalidated(&self, ct: f64) -> bool {
        matches!(self.barrier.read().time, Some(t) if ct < t)
    }

    fn is_hard_invalidated(&self, ct: f64) -> bool {
        let barrier = self.barrier.read();
        matches!((barrier.time, barrier.mode), (Some(t), Some(InvalidationMode::Hard)) if ct < t)
    }

    fn is_soft_invalidated(&self, ct: f64) -> bool {
        let barrier = self.barrier.read();
        matches!((barrier.time, barrier.mode), (Some(t), Some(InvalidationMode::Soft)) if ct < t)
    }

    fn was_hard_invalidated(&self) -> bool {
        matches!(self.barrier.read().mode, Some(InvalidationMode::Hard))
    }

    fn was_soft_invalidated(&self) -> bool {
        matches!(self.barrier.read().mode, Some(InvalidationMode::Soft))
    }
}
