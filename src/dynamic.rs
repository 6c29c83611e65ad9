//! Live-updatable configuration.
//!
//! The gate resolves policies on every request, so reads must never block an operator
//! swapping in a new table. [`DynamicConfig`] keeps the current value behind an
//! [`ArcSwap`]: readers take a snapshot, writers publish a whole new value.

use std::sync::Arc;

use arc_swap::ArcSwap;

/// Shared, hot-swappable value.
///
/// Clones share one slot; a replacement through any handle is seen by all of them.
/// Snapshots already handed out keep the value they were taken from.
#[derive(Debug)]
pub struct DynamicConfig<T> {
    slot: Arc<ArcSwap<T>>,
}

impl<T> Clone for DynamicConfig<T> {
    fn clone(&self) -> Self {
        Self { slot: Arc::clone(&self.slot) }
    }
}

impl<T> DynamicConfig<T> {
    pub fn new(value: T) -> Self {
        Self { slot: Arc::new(ArcSwap::from_pointee(value)) }
    }

    /// Current value.
    pub fn snapshot(&self) -> Arc<T> {
        self.slot.load_full()
    }

    /// Publish `value`, returning the one it displaced.
    pub fn replace(&self, value: T) -> Arc<T> {
        self.slot.swap(Arc::new(value))
    }

    /// Derive the next value from the current one.
    ///
    /// `f` is retried if another writer publishes first, so no concurrent update is lost.
    pub fn update<F>(&self, mut f: F)
    where
        F: FnMut(&T) -> T,
    {
        self.slot.rcu(|current| f(current.as_ref()));
    }
}

impl<T: Default> Default for DynamicConfig<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
