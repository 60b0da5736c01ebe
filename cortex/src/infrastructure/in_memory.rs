// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory [`PersistentStore`] for tests and single-process deployments.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use super::repository::PersistentStore;
use crate::domain::ScoredRecord;
use crate::error::CortexError;

pub struct InMemoryPersistentStore<T: ScoredRecord> {
    records: DashMap<T::Id, T>,
    fail_writes: AtomicBool,
}

impl<T: ScoredRecord> InMemoryPersistentStore<T> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `put` fail, simulating a storage outage.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<T: ScoredRecord> Default for InMemoryPersistentStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: ScoredRecord> PersistentStore<T> for InMemoryPersistentStore<T> {
    async fn put(&self, record: &T) -> Result<(), CortexError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CortexError::Persistence(format!(
                "{} store unavailable",
                T::KIND
            )));
        }
        self.records.insert(record.id(), record.clone());
        Ok(())
    }

    async fn get(&self, id: T::Id) -> Result<Option<T>, CortexError> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    async fn scan(&self) -> Result<Vec<T>, CortexError> {
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MemoryItem, MemoryKind};

    #[tokio::test]
    async fn test_put_get_scan() {
        let store = InMemoryPersistentStore::<MemoryItem>::new();
        let item = MemoryItem::new("needs income in retirement", MemoryKind::Observation, 0.6, vec![1.0, 0.0]);

        store.put(&item).await.unwrap();

        let found = store.get(item.id).await.unwrap().unwrap();
        assert_eq!(found.description, "needs income in retirement");
        assert_eq!(store.scan().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_simulated_outage() {
        let store = InMemoryPersistentStore::<MemoryItem>::new();
        store.set_fail_writes(true);
        let item = MemoryItem::new("x", MemoryKind::Observation, 0.6, vec![1.0]);

        assert!(matches!(store.put(&item).await, Err(CortexError::Persistence(_))));
        assert!(store.is_empty());
    }
}
