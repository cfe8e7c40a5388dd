//! Advisory per-key locks serializing refreshes of the same cache key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::cache::CacheKey;

type LockMap = HashMap<CacheKey, Arc<Mutex<()>>>;

/// One mutex per `(user, platform filter, time range)` with a refresh in
/// flight.
///
/// Concurrent refreshes of the same key run one after the other instead of
/// interleaving their checkpoint writes. Both still run to completion and
/// the later write wins. A key's entry is removed when its last holder or
/// waiter is gone, so the map only holds keys being refreshed.
#[derive(Debug, Default)]
pub struct RefreshLocks {
    // Never held across an await.
    locks: Arc<StdMutex<LockMap>>,
}

fn lock_map(map: &StdMutex<LockMap>) -> MutexGuard<'_, LockMap> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RefreshLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive refresh access to `key`. Released on drop.
    pub async fn acquire(&self, key: CacheKey) -> RefreshGuard {
        let lock = self.get_or_create(key);
        let guard = lock.lock_owned().await;
        self.guard(key, guard)
    }

    /// Take the lock only if no refresh of `key` is running.
    pub fn try_acquire(&self, key: CacheKey) -> Option<RefreshGuard> {
        let lock = self.get_or_create(key);
        match lock.try_lock_owned() {
            Ok(guard) => Some(self.guard(key, guard)),
            Err(_) => {
                // `try_lock_owned` consumed and dropped our Arc.
                remove_if_idle(&mut lock_map(&self.locks), &key);
                None
            }
        }
    }

    fn guard(&self, key: CacheKey, guard: OwnedMutexGuard<()>) -> RefreshGuard {
        RefreshGuard {
            key,
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    fn get_or_create(&self, key: CacheKey) -> Arc<Mutex<()>> {
        let mut map = lock_map(&self.locks);
        Arc::clone(map.entry(key).or_default())
    }

    /// Number of keys with a refresh running or waiting.
    #[must_use]
    pub fn key_count(&self) -> usize {
        lock_map(&self.locks).len()
    }
}

#[derive(Debug)]
pub struct RefreshGuard {
    key: CacheKey,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<StdMutex<LockMap>>,
}

impl RefreshGuard {
    #[must_use]
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        let mut map = lock_map(&self.locks);
        // Release first so the map's Arc is the only one left when idle.
        drop(self.guard.take());
        remove_if_idle(&mut map, &self.key);
    }
}

fn remove_if_idle(map: &mut LockMap, key: &CacheKey) {
    if map.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
        map.remove(key);
    }
}
