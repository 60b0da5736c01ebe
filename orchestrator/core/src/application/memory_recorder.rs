// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Memory Recorder
//!
//! Turns important statements into `Observation` memories. Recording is
//! best-effort: [`MemoryRecorder::record_exchange`] logs and counts failures
//! and never returns them. A cancelled exchange stops without storing the
//! statement it was embedding.

use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use counsel_cortex::{CortexEvent, Embedder, MemoryId, MemoryItem, MemoryKind, MemoryStore};

use crate::domain::config::OrchestrationConfig;
use crate::domain::consultation::{ConsultationId, Speaker};
use crate::domain::error::GuidanceError;
use crate::domain::importance::ImportanceScorer;
use crate::infrastructure::event_bus::EventBus;

pub struct MemoryRecorder {
    memories: Arc<MemoryStore>,
    embedder: Arc<dyn Embedder>,
    scorer: Arc<dyn ImportanceScorer>,
    customer_floor: f64,
    advisor_floor: f64,
    event_bus: EventBus,
}

impl MemoryRecorder {
    pub fn new(
        memories: Arc<MemoryStore>,
        embedder: Arc<dyn Embedder>,
        scorer: Arc<dyn ImportanceScorer>,
        config: &OrchestrationConfig,
        event_bus: EventBus,
    ) -> Self {
        Self {
            memories,
            embedder,
            scorer,
            customer_floor: config.customer_importance_floor,
            advisor_floor: config.advisor_importance_floor,
            event_bus,
        }
    }

    fn floor(&self, speaker: Speaker) -> f64 {
        match speaker {
            Speaker::Customer => self.customer_floor,
            Speaker::Advisor => self.advisor_floor,
        }
    }

    /// Store `text` as an observation if it scores above the speaker's floor.
    /// `embedding` may carry a vector already computed for the same text.
    pub async fn record_statement(
        &self,
        consultation_id: ConsultationId,
        speaker: Speaker,
        text: &str,
        embedding: Option<Vec<f32>>,
        cancel: &CancellationToken,
    ) -> Result<Option<MemoryId>, GuidanceError> {
        let importance = self.scorer.score(text, speaker);
        if importance <= self.floor(speaker) {
            debug!(%consultation_id, ?speaker, importance, "Statement below importance floor");
            return Ok(None);
        }

        let embedding = match embedding {
            Some(embedding) => embedding,
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GuidanceError::Cancelled),
                embedding = self.embedder.embed(text) => embedding?,
            },
        };
        let item = MemoryItem::new(text, MemoryKind::Observation, importance, embedding)
            .with_citation(format!("consultation:{}", consultation_id));
        let memory_id = self.memories.add(item).await?;

        self.event_bus.publish_cortex_event(CortexEvent::MemoryRecorded {
            memory_id,
            consultation_id: Some(consultation_id.0),
            kind: MemoryKind::Observation,
            importance,
            timestamp: Utc::now(),
        });
        Ok(Some(memory_id))
    }

    /// Record both sides of an exchange. Returns how many memories were stored.
    pub async fn record_exchange(
        &self,
        consultation_id: ConsultationId,
        customer_text: &str,
        customer_embedding: Option<Vec<f32>>,
        advisor_text: &str,
        cancel: &CancellationToken,
    ) -> usize {
        let mut stored = 0;
        for (speaker, text, embedding) in [
            (Speaker::Customer, customer_text, customer_embedding),
            (Speaker::Advisor, advisor_text, None),
        ] {
            match self.record_statement(consultation_id, speaker, text, embedding, cancel).await {
                Ok(Some(_)) => stored += 1,
                Ok(None) => {}
                Err(GuidanceError::Cancelled) => {
                    debug!(%consultation_id, ?speaker, "Memory recording cancelled");
                    break;
                }
                Err(e) => {
                    counter!("counsel_memory_write_failures_total").increment(1);
                    warn!(%consultation_id, ?speaker, error = %e, "Failed to record memory");
                }
            }
        }
        stored
    }
}
