// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Context Retriever
//!
//! Embeds a query once and ranks the memory, case and rule stores against it
//! concurrently.

use std::sync::Arc;
use tracing::debug;

use counsel_cortex::{Embedder, KnowledgeBase, RetrievalWeights};

use crate::domain::config::RetrievalConfig;
use crate::domain::context::RetrievedContext;
use crate::domain::error::GuidanceError;

#[derive(Debug, Clone, Copy)]
pub struct RetrievalSettings {
    pub memory_weights: RetrievalWeights,
    pub precedent_weights: RetrievalWeights,
    pub memory_top_k: usize,
    pub case_top_k: usize,
    pub rule_top_k: usize,
}

impl From<&RetrievalConfig> for RetrievalSettings {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            memory_weights: config.memory_weights,
            precedent_weights: config.precedent_weights,
            memory_top_k: config.memory_top_k,
            case_top_k: config.case_top_k,
            rule_top_k: config.rule_top_k,
        }
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

pub struct ContextRetriever {
    knowledge: KnowledgeBase,
    embedder: Arc<dyn Embedder>,
    settings: RetrievalSettings,
}

impl ContextRetriever {
    pub fn new(knowledge: KnowledgeBase, embedder: Arc<dyn Embedder>, settings: RetrievalSettings) -> Self {
        Self {
            knowledge,
            embedder,
            settings,
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub async fn retrieve(&self, query: &str) -> Result<RetrievedContext, GuidanceError> {
        let embedding = self.embedder.embed(query).await?;
        self.retrieve_embedded(&embedding).await
    }

    pub async fn retrieve_embedded(&self, embedding: &[f32]) -> Result<RetrievedContext, GuidanceError> {
        let s = &self.settings;
        let (memories, cases, rules) = tokio::try_join!(
            self.knowledge
                .memories
                .retrieve(embedding, s.memory_top_k, Some(s.memory_weights)),
            self.knowledge
                .cases
                .retrieve(embedding, s.case_top_k, Some(s.precedent_weights)),
            self.knowledge
                .rules
                .retrieve(embedding, s.rule_top_k, Some(s.precedent_weights)),
        )?;

        debug!(
            memories = memories.len(),
            cases = cases.len(),
            rules = rules.len(),
            "Retrieved context"
        );
        Ok(RetrievedContext { memories, cases, rules })
    }
}
