// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Advisor Service
//!
//! Entry point of the guidance core. Wires the knowledge base, the
//! orchestration engine, the learning loop and the background pool from a
//! [`CounselConfig`] and exposes the operations a host application calls.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use counsel_cortex::{
    Case, Embedder, HashEmbedder, HttpEmbedder, InMemoryPersistentStore, JsonFileStore, KnowledgeBase, MemoryItem,
    PersistentStore, RecencyDecay, RetrievalWeights, Rule, ScoredRecord, ScoredStore,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::compliance_validator::ComplianceValidator;
use super::context_retriever::{ContextRetriever, RetrievalSettings};
use super::generation::Generator;
use super::learning_loop::LearningLoop;
use super::ledger::{ConsultationLedger, ConsultationRecord};
use super::memory_recorder::MemoryRecorder;
use super::orchestration::{EngineSettings, GuidanceReply, GuidanceStream, OrchestrationEngine};
use super::validation_pool::ValidationPool;
use crate::domain::config::{resolve_secret, CounselConfig, StoreBackend};
use crate::domain::consultation::{ConsultationId, CustomerProfile, GuidanceRequest};
use crate::domain::context::RetrievedContext;
use crate::domain::error::GuidanceError;
use crate::domain::importance::HeuristicImportanceScorer;
use crate::domain::learning::{ConsultationOutcome, LearningReport};
use crate::domain::llm::LLMProvider;
use crate::domain::prompt::PromptBuilder;
use crate::domain::signals::KeywordSignalClassifier;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::llm::ProviderRegistry;
use crate::infrastructure::prompt_template_engine::TemplatePromptBuilder;

pub struct AdvisorService {
    engine: Arc<OrchestrationEngine>,
    learning: LearningLoop,
    retriever: Arc<ContextRetriever>,
    ledger: Arc<ConsultationLedger>,
    pool: Arc<ValidationPool>,
    knowledge: KnowledgeBase,
    event_bus: EventBus,
}

impl AdvisorService {
    /// Assemble the service around an existing provider, embedder and
    /// knowledge base. Prompts come from the embedded templates.
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        embedder: Arc<dyn Embedder>,
        knowledge: KnowledgeBase,
        config: &CounselConfig,
    ) -> Self {
        Self::with_prompt_builder(llm, Arc::new(TemplatePromptBuilder::new()), embedder, knowledge, config)
    }

    pub fn with_prompt_builder(
        llm: Arc<dyn LLMProvider>,
        prompts: Arc<dyn PromptBuilder>,
        embedder: Arc<dyn Embedder>,
        knowledge: KnowledgeBase,
        config: &CounselConfig,
    ) -> Self {
        let spec = &config.spec;
        let event_bus = EventBus::with_default_capacity();
        let generator = Arc::new(Generator::new(llm, prompts));
        let validator = Arc::new(ComplianceValidator::new(generator.clone(), &spec.compliance));
        let retriever = Arc::new(ContextRetriever::new(
            knowledge.clone(),
            embedder.clone(),
            RetrievalSettings::from(&spec.retrieval),
        ));
        let recorder = Arc::new(MemoryRecorder::new(
            knowledge.memories.clone(),
            embedder.clone(),
            Arc::new(HeuristicImportanceScorer),
            &spec.orchestration,
            event_bus.clone(),
        ));
        let ledger = Arc::new(ConsultationLedger::new());
        let pool = Arc::new(ValidationPool::new(spec.orchestration.validation_workers));

        let engine = OrchestrationEngine::new(
            retriever.clone(),
            generator.clone(),
            validator,
            recorder,
            ledger.clone(),
            pool.clone(),
            event_bus.clone(),
        )
        .with_classifier(Arc::new(KeywordSignalClassifier::new(spec.orchestration.opening_turns)))
        .with_settings(EngineSettings::from(&spec.orchestration));

        let learning = LearningLoop::new(generator, knowledge.clone(), embedder, &spec.learning, event_bus.clone());

        Self {
            engine: Arc::new(engine),
            learning,
            retriever,
            ledger,
            pool,
            knowledge,
            event_bus,
        }
    }

    /// Build the whole service from configuration: provider registry,
    /// embedder, persistence, and a knowledge base warmed from it.
    pub async fn from_config(config: &CounselConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let spec = &config.spec;

        let registry = Arc::new(ProviderRegistry::from_config(config)?);
        let embedder = build_embedder(config)?;

        let decay = RecencyDecay::with_half_life_hours(spec.retrieval.half_life_hours);
        let dimensions = spec.embedding.dimensions;
        let (memory_weights, precedent_weights) = (spec.retrieval.memory_weights, spec.retrieval.precedent_weights);
        let store = |weights| StoreShape {
            weights,
            decay,
            dimensions,
        };
        let knowledge = match spec.persistence.backend {
            StoreBackend::Memory => KnowledgeBase::new(
                Arc::new(store(memory_weights).build::<MemoryItem>(Arc::new(InMemoryPersistentStore::new()))),
                Arc::new(store(precedent_weights).build::<Case>(Arc::new(InMemoryPersistentStore::new()))),
                Arc::new(store(precedent_weights).build::<Rule>(Arc::new(InMemoryPersistentStore::new()))),
            ),
            StoreBackend::File => {
                let dir = spec.persistence.data_dir();
                info!(path = %dir.display(), "Using file persistence");
                KnowledgeBase::new(
                    Arc::new(store(memory_weights).build(open_file_store::<MemoryItem>(&dir).await?)),
                    Arc::new(store(precedent_weights).build(open_file_store::<Case>(&dir).await?)),
                    Arc::new(store(precedent_weights).build(open_file_store::<Rule>(&dir).await?)),
                )
            }
        };
        knowledge.warm().await?;

        info!(
            default_model = %registry.default_alias(),
            models = registry.available_aliases().len(),
            embedding_dimensions = dimensions,
            chain_of_thought = spec.orchestration.chain_of_thought,
            "Advisor service ready"
        );
        Ok(Self::new(registry, embedder, knowledge, config))
    }

    /// Start tracking a consultation. Answering a turn opens it implicitly.
    pub fn open_consultation(&self, consultation_id: ConsultationId, customer: CustomerProfile, task_type: &str) {
        self.ledger.open(consultation_id, customer, task_type);
    }

    pub async fn provide_guidance(
        &self,
        request: &GuidanceRequest,
        cancel: &CancellationToken,
    ) -> Result<GuidanceReply, GuidanceError> {
        self.engine.run_turn(request, cancel).await
    }

    pub async fn provide_guidance_stream(
        &self,
        request: GuidanceRequest,
        cancel: CancellationToken,
    ) -> Result<GuidanceStream, GuidanceError> {
        self.engine.run_turn_stream(request, cancel).await
    }

    /// Close a consultation and learn from its outcome. Waits for any turn
    /// still running on the consultation. If learning fails the consultation
    /// stays open so the outcome can be recorded again; the retry skips the
    /// writes the failed attempt already made.
    pub async fn record_outcome(
        &self,
        consultation_id: ConsultationId,
        outcome: &ConsultationOutcome,
        cancel: &CancellationToken,
    ) -> Result<LearningReport, GuidanceError> {
        let turn = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GuidanceError::Cancelled),
            turn = self.ledger.begin_turn(consultation_id) => turn?,
        };
        let report = self.learning.learn(&turn, outcome, cancel).await?;
        turn.close(&self.ledger);
        Ok(report)
    }

    /// Close a consultation without learning from it.
    pub async fn abandon_consultation(&self, consultation_id: ConsultationId) -> Result<(), GuidanceError> {
        let record = self.ledger.abandon(consultation_id).await?;
        info!(%consultation_id, turns = record.transcript.len(), "Consultation abandoned");
        Ok(())
    }

    /// Drop consultations that have seen no activity for `max_idle`.
    pub fn evict_idle_consultations(&self, max_idle: Duration) -> usize {
        self.ledger.evict_idle(max_idle)
    }

    pub async fn retrieve_context(&self, query: &str) -> Result<RetrievedContext, GuidanceError> {
        self.retriever.retrieve(query).await
    }

    pub fn consultation(&self, consultation_id: ConsultationId) -> Option<ConsultationRecord> {
        self.ledger.snapshot(consultation_id)
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Wait for background validation and memory recording submitted so far.
    pub async fn wait_for_background(&self) {
        self.pool.wait_idle().await;
    }

    /// Stop accepting background work and drain what is queued.
    pub async fn shutdown(&self) {
        info!("Shutting down advisor service");
        self.pool.shutdown().await;
    }
}

fn build_embedder(config: &CounselConfig) -> anyhow::Result<Arc<dyn Embedder>> {
    let embedding = &config.spec.embedding;
    let Some(api) = embedding.backend.api() else {
        return Ok(Arc::new(HashEmbedder::new(embedding.dimensions)));
    };

    let endpoint = embedding
        .endpoint
        .clone()
        .ok_or_else(|| anyhow::anyhow!("embedding.endpoint is required for remote embeddings"))?;
    let model = embedding
        .model
        .clone()
        .ok_or_else(|| anyhow::anyhow!("embedding.model is required for remote embeddings"))?;
    let api_key = resolve_secret(embedding.api_key.as_deref())?;

    Ok(Arc::new(HttpEmbedder::new(api, endpoint, api_key, model, embedding.dimensions)))
}

/// Ranking parameters shared by the stores of one knowledge base
#[derive(Clone, Copy)]
struct StoreShape {
    weights: RetrievalWeights,
    decay: RecencyDecay,
    dimensions: usize,
}

impl StoreShape {
    fn build<T: ScoredRecord>(self, persistence: Arc<dyn PersistentStore<T>>) -> ScoredStore<T> {
        ScoredStore::new(persistence, self.weights)
            .with_decay(self.decay)
            .with_dimensions(self.dimensions)
    }
}

async fn open_file_store<T>(dir: &std::path::Path) -> anyhow::Result<Arc<dyn PersistentStore<T>>>
where
    T: ScoredRecord + Serialize + DeserializeOwned,
{
    Ok(Arc::new(JsonFileStore::<T>::open(dir).await?))
}
