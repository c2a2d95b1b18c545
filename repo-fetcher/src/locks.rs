//! Per-URI mutual exclusion
//!
//! Two runs, even for different trust anchors, never fetch the same URI at
//! the same time. Guards are owned so they can be held across awaits and
//! returned from trait methods.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub type UriGuard = OwnedMutexGuard<()>;

#[derive(Clone, Default)]
pub struct UriLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl UriLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `uri`
    pub async fn lock(&self, uri: &str) -> UriGuard {
        // clone the Arc out so the shard lock is released before awaiting
        let lock = self
            .locks
            .entry(uri.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Non-blocking variant, `None` while another holder exists
    pub fn try_lock(&self, uri: &str) -> Option<UriGuard> {
        let lock = self
            .locks
            .entry(uri.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.try_lock_owned().ok()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_uri_is_exclusive() {
        let locks = UriLocks::new();
        let guard = locks.lock("rsync://x/ta.cer").await;

        assert!(locks.try_lock("rsync://x/ta.cer").is_none());
        assert!(locks.try_lock("rsync://x/other.cer").is_some());

        drop(guard);
        assert!(locks.try_lock("rsync://x/ta.cer").is_some());
    }

    #[tokio::test]
    async fn test_waiter_proceeds_after_release() {
        let locks = UriLocks::new();
        let guard = locks.lock("rsync://x/repo/").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("rsync://x/repo/").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(locks.len(), 1);
    }
}
