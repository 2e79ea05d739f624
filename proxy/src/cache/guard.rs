//! The single lock shared by the refresh path and every reader.
//!
//! The whole [`CacheStore`] is locked at once so a reader can never combine
//! channel A from one cycle with channel B from another. The lock is
//! re-entrant: helpers that read the store may be called from inside an
//! already guarded section. Guards must never be held across an `.await`.

use alloc::sync::Arc;
use core::cell::RefCell;

use parking_lot::ReentrantMutex;

use super::CacheStore;

/// Cloneable handle to the guarded cache.
#[derive(Clone)]
pub struct ConcurrencyGuard {
    inner: Arc<ReentrantMutex<RefCell<CacheStore>>>,
}

impl ConcurrencyGuard {
    #[must_use]
    pub fn new(store: CacheStore) -> Self {
        Self {
            inner: Arc::new(ReentrantMutex::new(RefCell::new(store))),
        }
    }

    /// Hold the lock for the whole of `f`.
    ///
    /// Calls to [`Self::read`] and [`Self::write`] made by `f` on the same
    /// thread re-enter the lock instead of deadlocking.
    pub fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _held = self.inner.lock();
        f()
    }

    /// Run `f` with shared access to the store.
    ///
    /// # Panics
    ///
    /// Panics if called from inside a [`Self::write`] closure on the same thread.
    pub fn read<R>(&self, f: impl FnOnce(&CacheStore) -> R) -> R {
        let held = self.inner.lock();
        let store = held.borrow();
        f(&store)
    }

    /// Run `f` with exclusive access to the store.
    ///
    /// # Panics
    ///
    /// Panics if called from inside another [`Self::read`] or [`Self::write`]
    /// closure on the same thread.
    pub fn write<R>(&self, f: impl FnOnce(&mut CacheStore) -> R) -> R {
        let held = self.inner.lock();
        let mut store = held.borrow_mut();
        f(&mut store)
    }
}
