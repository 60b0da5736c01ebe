// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! The three scored stores the guidance core retrieves from.

use std::sync::Arc;
use tracing::info;

use super::scored_store::ScoredStore;
use crate::domain::{Case, MemoryItem, RecencyDecay, RetrievalWeights, Rule};
use crate::error::CortexError;
use crate::infrastructure::{InMemoryPersistentStore, PersistentStore};

pub type MemoryStore = ScoredStore<MemoryItem>;
pub type CaseStore = ScoredStore<Case>;
pub type RuleStore = ScoredStore<Rule>;

#[derive(Clone)]
pub struct KnowledgeBase {
    pub memories: Arc<MemoryStore>,
    pub cases: Arc<CaseStore>,
    pub rules: Arc<RuleStore>,
}

impl KnowledgeBase {
    pub fn new(memories: Arc<MemoryStore>, cases: Arc<CaseStore>, rules: Arc<RuleStore>) -> Self {
        Self {
            memories,
            cases,
            rules,
        }
    }

    /// Build the stores over the given persistence backends with default weights.
    pub fn with_persistence(
        memories: Arc<dyn PersistentStore<MemoryItem>>,
        cases: Arc<dyn PersistentStore<Case>>,
        rules: Arc<dyn PersistentStore<Rule>>,
        decay: RecencyDecay,
    ) -> Self {
        Self {
            memories: Arc::new(ScoredStore::new(memories, RetrievalWeights::memory()).with_decay(decay)),
            cases: Arc::new(ScoredStore::new(cases, RetrievalWeights::precedent()).with_decay(decay)),
            rules: Arc::new(ScoredStore::new(rules, RetrievalWeights::precedent()).with_decay(decay)),
        }
    }

    pub fn in_memory() -> Self {
        Self::with_persistence(
            Arc::new(InMemoryPersistentStore::new()),
            Arc::new(InMemoryPersistentStore::new()),
            Arc::new(InMemoryPersistentStore::new()),
            RecencyDecay::default(),
        )
    }

    /// Load all three stores from persistence.
    pub async fn warm(&self) -> Result<(), CortexError> {
        let memories = self.memories.warm().await?;
        let cases = self.cases.warm().await?;
        let rules = self.rules.warm().await?;
        info!(memories, cases, rules, "Knowledge base warmed");
        Ok(())
    }
}
