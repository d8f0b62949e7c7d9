//! Striped read/write locks keyed by object key.
//!
//! Every key hashes onto one of a fixed number of stripes. Readers of a key
//! share its stripe, writers take it exclusively. Copies lock two stripes,
//! always in ascending stripe order, so concurrent copies cannot deadlock.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const DEFAULT_STRIPES: usize = 64;

pub struct KeyLocks {
    stripes: Vec<RwLock<()>>,
}

/// Locks held for the duration of a copy.
pub struct CopyGuard<'a> {
    _source: Option<RwLockReadGuard<'a, ()>>,
    _destination: RwLockWriteGuard<'a, ()>,
}

impl KeyLocks {
    pub fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| RwLock::new(())).collect(),
        }
    }

    fn stripe(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }

    pub async fn read(&self, key: &str) -> RwLockReadGuard<'_, ()> {
        self.stripes[self.stripe(key)].read().await
    }

    pub async fn write(&self, key: &str) -> RwLockWriteGuard<'_, ()> {
        self.stripes[self.stripe(key)].write().await
    }

    /// Shared access to `source` and exclusive access to `destination`.
    ///
    /// When both keys land on the same stripe only the exclusive lock is taken.
    pub async fn copy(&self, source: &str, destination: &str) -> CopyGuard<'_> {
        let src = self.stripe(source);
        let dst = self.stripe(destination);

        if src == dst {
            return CopyGuard {
                _source: None,
                _destination: self.stripes[dst].write().await,
            };
        }

        if src < dst {
            let source_guard = self.stripes[src].read().await;
            let destination_guard = self.stripes[dst].write().await;
            CopyGuard {
                _source: Some(source_guard),
                _destination: destination_guard,
            }
        } else {
            let destination_guard = self.stripes[dst].write().await;
            let source_guard = self.stripes[src].read().await;
            CopyGuard {
                _source: Some(source_guard),
                _destination: destination_guard,
            }
        }
    }
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};

    #[tokio::test]
    async fn test_writer_excludes_readers_of_same_key() {
        let locks = KeyLocks::new(8);
        let _writer = locks.write("/a.txt").await;
        assert!(locks.stripes[locks.stripe("/a.txt")].try_read().is_err());
    }

    #[tokio::test]
    async fn test_readers_share_a_key() {
        let locks = KeyLocks::new(8);
        let _first = locks.read("/a.txt").await;
        let _second = locks.read("/a.txt").await;
    }

    #[tokio::test]
    async fn test_copy_onto_same_stripe_takes_single_lock() {
        let locks = KeyLocks::new(1);
        let guard = locks.copy("/a.txt", "/b.txt").await;
        assert!(guard._source.is_none());
        drop(guard);
        let _again = locks.copy("/a.txt", "/a.txt").await;
    }

    #[tokio::test]
    async fn test_opposite_copies_do_not_deadlock() {
        let locks = Arc::new(KeyLocks::new(16));
        let mut tasks = Vec::new();
        for i in 0..32 {
            let locks = locks.clone();
            tasks.push(tokio::spawn(async move {
                let (src, dst) = if i % 2 == 0 { ("/x", "/y") } else { ("/y", "/x") };
                let _guard = locks.copy(src, dst).await;
                tokio::task::yield_now().await;
            }));
        }

        let all = futures::future::join_all(tasks);
        let results = tokio::time::timeout(Duration::from_secs(5), all)
            .await
            .expect("copies deadlocked");
        for result in results {
            result.unwrap();
        }
    }
}
