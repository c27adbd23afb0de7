use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

/// Registry of per-key async mutexes.
///
/// Holding the guard for a key serializes all writers to that key in this process.
/// Guards for different keys never block each other. An entry lives only while some
/// task holds or waits for its key; the last guard to drop removes it.
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<Mutex<LockMap>>,
}

/// Exclusive access to one key, released on drop
pub struct KeyGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<Mutex<LockMap>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let mutex = self.lock_for(key);
        let guard = mutex.lock_owned().await;
        KeyGuard {
            key: key.to_string(),
            guard: Some(guard),
            locks: self.locks.clone(),
        }
    }

    /// Number of keys currently held or waited on
    pub fn len(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
        // A poisoned registry only loses sharing: callers fall back to a private mutex
        // and the versioned store still rejects racing writes.
        match self.locks.lock() {
            Ok(mut locks) => locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone(),
            Err(_) => Arc::new(AsyncMutex::new(())),
        }
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };

        if let Ok(mut locks) = self.locks.lock() {
            let mutex = OwnedMutexGuard::mutex(&guard);
            // One reference in the map, one in this guard; anything more is a waiter
            let unused = locks
                .get(&self.key)
                .is_some_and(|entry| Arc::ptr_eq(entry, mutex) && Arc::strong_count(mutex) <= 2);
            if unused {
                locks.remove(&self.key);
            }
        }

        drop(guard);
    }
}
