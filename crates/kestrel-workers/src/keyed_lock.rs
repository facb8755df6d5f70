//! Named mutexes created on demand.
//!
//! [`KeyedLocks`] hands out an async mutex per string key. Entries are
//! reference counted and removed from the table when the last holder or
//! waiter goes away, so the table only holds keys that are in use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OwnedMutexGuard;

type LockTable = HashMap<String, LockEntry>;

struct LockEntry {
    lock: Arc<tokio::sync::Mutex<()>>,
    refs: usize,
}

#[derive(Clone, Default)]
pub struct KeyedLocks {
    table: Arc<Mutex<LockTable>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive ownership of `key`.
    ///
    /// The returned guard releases the key on drop. Dropping the future
    /// while it waits also releases its reference.
    pub async fn lock(&self, key: impl Into<String>) -> KeyedGuard {
        let key = key.into();
        let lock = {
            let mut table = lock_table(&self.table);
            let entry = table.entry(key.clone()).or_insert_with(|| LockEntry {
                lock: Arc::new(tokio::sync::Mutex::new(())),
                refs: 0,
            });
            entry.refs += 1;
            entry.lock.clone()
        };

        // Created before awaiting so a cancelled wait still decrements.
        let reference = KeyRef {
            table: self.table.clone(),
            key,
        };
        let guard = lock.lock_owned().await;

        KeyedGuard {
            _guard: guard,
            _reference: reference,
        }
    }

    /// Number of keys currently held or awaited.
    pub fn active_keys(&self) -> usize {
        lock_table(&self.table).len()
    }
}

fn lock_table(table: &Mutex<LockTable>) -> MutexGuard<'_, LockTable> {
    match table.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!("keyed lock table poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Holds a key exclusively until dropped.
pub struct KeyedGuard {
    // Field order matters: the mutex is released before the refcount drops.
    _guard: OwnedMutexGuard<()>,
    _reference: KeyRef,
}

struct KeyRef {
    table: Arc<Mutex<LockTable>>,
    key: String,
}

impl Drop for KeyRef {
    fn drop(&mut self) {
        let mut table = lock_table(&self.table);
        if let Some(entry) = table.get_mut(&self.key) {
            entry.refs -= 1;
            if entry.refs == 0 {
                table.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn entries_are_removed_after_release() {
        let locks = KeyedLocks::new();
        {
            let _a = locks.lock("move:a:b").await;
            let _b = locks.lock("move:c:d").await;
            assert_eq!(locks.active_keys(), 2);
        }
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn same_key_is_serialized() {
        let locks = KeyedLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock("move:origin:target").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.expect("task should not panic");
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn cancelled_waiter_releases_reference() {
        let locks = KeyedLocks::new();
        let held = locks.lock("k").await;

        let waiter = locks.lock("k");
        let timed_out = tokio::time::timeout(Duration::from_millis(10), waiter).await;
        assert!(timed_out.is_err());

        drop(held);
        assert_eq!(locks.active_keys(), 0);
    }
}
