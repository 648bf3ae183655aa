//! Keyed mutual exclusion
//!
//! Invariants:
//! - For one key, at most one closure runs at a time
//! - Closures on distinct keys never wait for each other
//! - The map only holds keys with a live invocation

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Per-key handle.
///
/// `users` is only modified while the map lock is held.
#[derive(Debug, Default)]
struct Slot {
    gate: Mutex<()>,
    users: AtomicUsize,
}

/// Serializes work sharing a logical resource key.
///
/// Waiters on the same key are woken in the order the platform mutex grants,
/// which is best-effort FIFO.
#[derive(Debug)]
pub struct ResourceLock<K> {
    slots: Mutex<HashMap<K, Arc<Slot>>>,
}

impl<K> Default for ResourceLock<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> ResourceLock<K>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` while holding exclusive access to `key`.
    ///
    /// The slot is released on every exit path, including a panic in `f`.
    pub fn with_lock<R, F>(&self, key: &K, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let slot = self.enter(key);
        let _release = Release {
            lock: self,
            key,
            slot: &slot,
        };
        let _held = lock_recover(&slot.gate);
        f()
    }

    /// Number of keys with a live invocation.
    pub fn active_keys(&self) -> usize {
        lock_recover(&self.slots).len()
    }

    fn enter(&self, key: &K) -> Arc<Slot> {
        let mut slots = lock_recover(&self.slots);
        let slot = Arc::clone(slots.entry(key.clone()).or_default());
        slot.users.fetch_add(1, Ordering::SeqCst);
        slot
    }

    fn leave(&self, key: &K, slot: &Slot) {
        let mut slots = lock_recover(&self.slots);
        if slot.users.fetch_sub(1, Ordering::SeqCst) == 1 {
            slots.remove(key);
        }
    }
}

struct Release<'a, K>
where
    K: Eq + Hash + Clone,
{
    lock: &'a ResourceLock<K>,
    key: &'a K,
    slot: &'a Slot,
}

impl<K> Drop for Release<'_, K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        self.lock.leave(self.key, self.slot);
    }
}

fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
