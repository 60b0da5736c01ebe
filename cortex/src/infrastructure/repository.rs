// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository interface for durable record storage
//! The surrounding application supplies the real implementation; the schema is its concern

use async_trait::async_trait;

use crate::domain::ScoredRecord;
use crate::error::CortexError;

/// Durable keyed storage for one record kind
#[async_trait]
pub trait PersistentStore<T: ScoredRecord>: Send + Sync {
    /// Insert or replace a record
    async fn put(&self, record: &T) -> Result<(), CortexError>;

    /// Find a record by its ID
    async fn get(&self, id: T::Id) -> Result<Option<T>, CortexError>;

    /// Every stored record (used to warm the in-process index at start-up)
    async fn scan(&self) -> Result<Vec<T>, CortexError>;
}
