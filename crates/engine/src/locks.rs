//! Per-group write serialization.
//!
//! Every mutation of a group takes its lock before opening the DB
//! transaction, so read-modify-write cycles on the same group never
//! interleave while different groups proceed in parallel.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct GroupLocks {
    inner: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl GroupLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `group_id`.
    pub async fn acquire(&self, group_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(group_id).or_default())
        };
        lock.lock_owned().await
    }

    /// Drops the lock of a deleted group.
    pub fn forget(&self, group_id: i64) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if map
            .get(&group_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&group_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_group_is_exclusive() {
        let locks = GroupLocks::new();
        let guard = locks.acquire(1).await;
        let second = tokio::time::timeout(Duration::from_millis(20), locks.acquire(1)).await;
        assert!(second.is_err());
        drop(guard);
        let third = tokio::time::timeout(Duration::from_millis(200), locks.acquire(1)).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn different_groups_do_not_block() {
        let locks = GroupLocks::new();
        let _one = locks.acquire(1).await;
        let two = tokio::time::timeout(Duration::from_millis(200), locks.acquire(2)).await;
        assert!(two.is_ok());
    }
}
