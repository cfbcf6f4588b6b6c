//! Keyed async mutual exclusion
//!
//! One tokio mutex per key, created on first use. Guards are owned so they
//! can be held across the whole of a rollout.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-key async locks
pub struct KeyedLocks<K: Eq + Hash> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    fn mutex(&self, key: &K) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        self.mutex(key).lock_owned().await
    }

    /// Exclusive access to `key` if nobody holds it
    pub fn try_lock(&self, key: &K) -> Option<OwnedMutexGuard<()>> {
        self.mutex(key).try_lock_owned().ok()
    }

    /// Forget a key that will not be used again
    pub fn remove(&self, key: &K) {
        self.locks.remove(key);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = KeyedLocks::new();
        let guard = locks.lock(&"a").await;
        assert!(locks.try_lock(&"a").is_none());
        assert!(locks.try_lock(&"b").is_some());
        drop(guard);
        assert!(locks.try_lock(&"a").is_some());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_runs_after_release() {
        let locks = Arc::new(KeyedLocks::new());
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let guard = locks.lock(&1u32).await;
        let waiter = {
            let locks = locks.clone();
            let order = order.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&1u32).await;
                order.lock().unwrap().push("waiter");
            })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        order.lock().unwrap().push("holder");
        drop(guard);
        waiter.await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["holder", "waiter"]);
    }
}
