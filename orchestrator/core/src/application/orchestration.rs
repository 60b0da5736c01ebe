// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Orchestration Engine
//!
//! Drives one guidance turn:
//!
//! ```text
//! RetrieveContext → Generate → Validate ─┬─ passed, no review ──→ Return
//!                                        ├─ failed ─────────────→ Refine ─────→ Return
//!                                        └─ passed, review ─────→ Strengthen ─→ Return
//! ```
//!
//! At most one corrective pass runs and its output is not validated again.
//!
//! The streaming variant yields guidance fragments as they arrive. Once the
//! stream is exhausted the text is appended to the consultation and
//! validated on the [`ValidationPool`]; a failing verdict cannot retract the
//! delivered text, so its issues are carried into the next turn's prompt.

use chrono::Utc;
use futures::stream::BoxStream;
use futures::StreamExt;
use metrics::counter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use counsel_cortex::RuleId;

use super::compliance_validator::ComplianceValidator;
use super::context_retriever::ContextRetriever;
use super::generation::Generator;
use super::ledger::{ConsultationLedger, ConsultationRecord, TurnGuard};
use super::memory_recorder::MemoryRecorder;
use super::validation_pool::ValidationPool;
use crate::domain::compliance::{Route, Verdict};
use crate::domain::config::OrchestrationConfig;
use crate::domain::consultation::{texts_by, ConsultationId, CustomerProfile, GuidanceRequest, Speaker, Turn};
use crate::domain::context::RetrievedContext;
use crate::domain::error::GuidanceError;
use crate::domain::events::GuidanceEvent;
use crate::domain::llm::GenerationOptions;
use crate::domain::prompt::{GenerationPurpose, PromptRequest, TurnFrame};
use crate::domain::signals::{ConversationSignals, KeywordSignalClassifier, SignalClassifier};
use crate::infrastructure::event_bus::EventBus;

/// Guidance fragments in delivery order
pub type GuidanceStream = BoxStream<'static, Result<String, GuidanceError>>;

/// A synchronous turn makes at most 3 generation calls: draft, compliance
/// review and one corrective pass. `chain_of_thought` adds the reasoning
/// call ahead of the draft, so the bound becomes 4 when it is on.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub chain_of_thought: bool,
    pub guidance: GenerationOptions,
    /// Options of the Strengthen regeneration: same budget, lower temperature
    pub strengthen: GenerationOptions,
}

impl From<&OrchestrationConfig> for EngineSettings {
    fn from(config: &OrchestrationConfig) -> Self {
        let guidance = GenerationOptions {
            max_tokens: Some(config.max_tokens),
            temperature: Some(config.temperature),
            stop_sequences: None,
        };
        let strengthen = GenerationOptions {
            temperature: Some(config.strengthen_temperature()),
            ..guidance.clone()
        };
        Self {
            chain_of_thought: config.chain_of_thought,
            guidance,
            strengthen,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&OrchestrationConfig::default())
    }
}

/// Result of a synchronous turn
#[derive(Debug, Clone)]
pub struct GuidanceReply {
    pub consultation_id: ConsultationId,
    pub text: String,
    pub route: Route,
    /// Verdict on the first draft; the corrective pass is not re-validated
    pub verdict: Verdict,
    pub borderline: bool,
    pub reasoning: Option<String>,
    pub signals: ConversationSignals,
    pub cited_rules: Vec<RuleId>,
    pub generation_calls: u32,
}

/// Everything a turn needs before the first generation call
struct PreparedTurn {
    turn: TurnGuard,
    record: ConsultationRecord,
    carried_issues: Vec<String>,
    embedding: Vec<f32>,
    context: RetrievedContext,
    signals: ConversationSignals,
}

impl PreparedTurn {
    fn frame<'a>(&'a self, request: &'a GuidanceRequest) -> TurnFrame<'a> {
        TurnFrame {
            customer: &request.customer,
            task_type: &request.task_type,
            question: &request.message,
            history: &self.record.transcript,
            context: &self.context,
            signals: self.signals,
            carried_issues: &self.carried_issues,
        }
    }
}

pub struct OrchestrationEngine {
    retriever: Arc<ContextRetriever>,
    generator: Arc<Generator>,
    validator: Arc<ComplianceValidator>,
    recorder: Arc<MemoryRecorder>,
    ledger: Arc<ConsultationLedger>,
    pool: Arc<ValidationPool>,
    event_bus: EventBus,
    classifier: Arc<dyn SignalClassifier>,
    settings: EngineSettings,
}

impl OrchestrationEngine {
    pub fn new(
        retriever: Arc<ContextRetriever>,
        generator: Arc<Generator>,
        validator: Arc<ComplianceValidator>,
        recorder: Arc<MemoryRecorder>,
        ledger: Arc<ConsultationLedger>,
        pool: Arc<ValidationPool>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            retriever,
            generator,
            validator,
            recorder,
            ledger,
            pool,
            event_bus,
            classifier: Arc::new(KeywordSignalClassifier::default()),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn SignalClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// RetrieveContext: lock the consultation, embed the question, rank the
    /// stores and derive the conversation signals.
    async fn prepare(&self, request: &GuidanceRequest, cancel: &CancellationToken) -> Result<PreparedTurn, GuidanceError> {
        let consultation_id = request.consultation_id;
        self.ledger
            .open(consultation_id, request.customer.clone(), request.task_type.clone());

        let turn = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GuidanceError::Cancelled),
            turn = self.ledger.begin_turn(consultation_id) => turn?,
        };
        let record = turn.record();
        let carried_issues = turn.pending_issues();

        let embedding = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GuidanceError::Cancelled),
            embedding = self.retriever.embedder().embed(&request.message) => embedding?,
        };
        let context = self.retriever.retrieve_embedded(&embedding).await?;

        let mut customer_turns = texts_by(&record.transcript, Speaker::Customer);
        customer_turns.push(request.message.as_str());
        let signals = self.classifier.classify(&customer_turns);

        debug!(
            %consultation_id,
            phase = signals.phase.as_str(),
            emotion = signals.emotion.as_str(),
            memories = context.memories.len(),
            cases = context.cases.len(),
            rules = context.rules.len(),
            carried_issues = carried_issues.len(),
            "Turn context ready"
        );

        Ok(PreparedTurn {
            turn,
            record,
            carried_issues,
            embedding,
            context,
            signals,
        })
    }

    async fn reason(
        &self,
        frame: &TurnFrame<'_>,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, GuidanceError> {
        if !self.settings.chain_of_thought {
            return Ok(None);
        }
        let reasoning = self
            .generator
            .complete(&PromptRequest::Reasoning { frame }, &self.settings.guidance, cancel)
            .await?;
        Ok(Some(reasoning))
    }

    /// Run one turn to completion: generate, validate, and apply at most one
    /// corrective pass.
    pub async fn run_turn(
        &self,
        request: &GuidanceRequest,
        cancel: &CancellationToken,
    ) -> Result<GuidanceReply, GuidanceError> {
        let consultation_id = request.consultation_id;
        let prepared = self.prepare(request, cancel).await?;
        let frame = prepared.frame(request);
        let mut generation_calls = 0u32;

        let reasoning = self.reason(&frame, cancel).await?;
        if reasoning.is_some() {
            generation_calls += 1;
        }

        let draft = self
            .generator
            .complete(
                &PromptRequest::Guidance {
                    frame: &frame,
                    reasoning: reasoning.as_deref(),
                },
                &self.settings.guidance,
                cancel,
            )
            .await?;
        generation_calls += 1;

        let verdict = self
            .validator
            .validate(&draft, &request.customer, reasoning.as_deref(), cancel)
            .await?;
        generation_calls += 1;

        let route = verdict.route();
        let text = match route {
            Route::Return => draft,
            Route::Refine => {
                generation_calls += 1;
                self.generator
                    .complete(
                        &PromptRequest::Refine {
                            frame: &frame,
                            draft: &draft,
                            issues: &verdict.issues,
                        },
                        &self.settings.guidance,
                        cancel,
                    )
                    .await?
            }
            Route::Strengthen => {
                generation_calls += 1;
                self.generator
                    .complete(
                        &PromptRequest::Strengthen {
                            frame: &frame,
                            draft: &draft,
                            verdict: &verdict,
                        },
                        &self.settings.strengthen,
                        cancel,
                    )
                    .await?
            }
        };

        let cited_rules = prepared.context.rule_ids();
        prepared.turn.append_exchange(
            Turn::customer(request.message.as_str()),
            Turn::advisor(text.as_str()),
            cited_rules.iter().copied(),
            prepared.carried_issues.len(),
        );
        let borderline = verdict.is_borderline(self.validator.thresholds());
        let signals = prepared.signals;
        self.record_memories(consultation_id, request.message.clone(), prepared.embedding, text.clone());

        self.event_bus.publish_guidance_event(GuidanceEvent::TurnCompleted {
            consultation_id,
            route: Some(route),
            streamed: false,
            generation_calls,
            completed_at: Utc::now(),
        });
        info!(
            %consultation_id,
            route = route.as_str(),
            confidence = verdict.confidence,
            borderline,
            generation_calls,
            "Guidance turn completed"
        );

        Ok(GuidanceReply {
            consultation_id,
            text,
            route,
            verdict,
            borderline,
            reasoning,
            signals,
            cited_rules,
            generation_calls,
        })
    }

    /// Start a streaming turn. Context retrieval, the optional reasoning call
    /// and opening the generation stream happen before this returns; the
    /// consultation stays locked until the returned stream is exhausted or
    /// dropped. A dropped or cancelled stream appends nothing.
    pub async fn run_turn_stream(
        self: &Arc<Self>,
        request: GuidanceRequest,
        cancel: CancellationToken,
    ) -> Result<GuidanceStream, GuidanceError> {
        let prepared = self.prepare(&request, &cancel).await?;

        let (reasoning, fragments) = {
            let frame = prepared.frame(&request);
            let reasoning = self.reason(&frame, &cancel).await?;
            let fragments = self
                .generator
                .stream(
                    &PromptRequest::Guidance {
                        frame: &frame,
                        reasoning: reasoning.as_deref(),
                    },
                    &self.settings.guidance,
                    &cancel,
                )
                .await?;
            (reasoning, fragments)
        };

        let engine = Arc::clone(self);
        let stream = async_stream::stream! {
            let mut fragments = fragments;
            let mut text = String::new();

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(GuidanceError::Cancelled),
                    next = fragments.next() => Ok(next),
                };
                match next {
                    Ok(Some(Ok(fragment))) => {
                        text.push_str(&fragment);
                        yield Ok(fragment);
                    }
                    Ok(Some(Err(source))) => {
                        yield Err(GuidanceError::Generation {
                            purpose: GenerationPurpose::Guidance.as_str(),
                            source,
                        });
                        return;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }

            engine.finish_stream(request, prepared, reasoning, text);
        };
        Ok(Box::pin(stream))
    }

    /// Append the streamed exchange, release the turn and hand validation
    /// and memory recording to the pool.
    fn finish_stream(
        &self,
        request: GuidanceRequest,
        prepared: PreparedTurn,
        reasoning: Option<String>,
        text: String,
    ) {
        let consultation_id = request.consultation_id;
        let PreparedTurn {
            turn,
            carried_issues,
            embedding,
            context,
            ..
        } = prepared;

        turn.append_exchange(
            Turn::customer(request.message.as_str()),
            Turn::advisor(text.as_str()),
            context.rule_ids(),
            carried_issues.len(),
        );
        drop(turn);

        let generation_calls = if reasoning.is_some() { 2 } else { 1 };
        self.spawn_stream_validation(consultation_id, request.customer, text.clone(), reasoning);
        self.record_memories(consultation_id, request.message, embedding, text);

        self.event_bus.publish_guidance_event(GuidanceEvent::TurnCompleted {
            consultation_id,
            route: None,
            streamed: true,
            generation_calls,
            completed_at: Utc::now(),
        });
        info!(%consultation_id, generation_calls, "Streamed guidance turn completed");
    }

    fn spawn_stream_validation(
        &self,
        consultation_id: ConsultationId,
        customer: CustomerProfile,
        text: String,
        reasoning: Option<String>,
    ) {
        let validator = self.validator.clone();
        let ledger = self.ledger.clone();
        let event_bus = self.event_bus.clone();

        self.pool.submit("stream_validation", move |cancel| async move {
            let verdict = validator
                .validate(&text, &customer, reasoning.as_deref(), &cancel)
                .await?;

            if !verdict.passed {
                counter!("counsel_stream_validation_failures_total").increment(1);
                warn!(
                    %consultation_id,
                    confidence = verdict.confidence,
                    issues = ?verdict.issues,
                    "Streamed guidance failed compliance after delivery"
                );
                if !ledger.carry_issues(consultation_id, verdict.issues.clone()) {
                    debug!(%consultation_id, "Consultation closed before issues could be carried forward");
                }
                event_bus.publish_guidance_event(GuidanceEvent::StreamValidationFailed {
                    consultation_id,
                    issues: verdict.issues.clone(),
                    failed_at: Utc::now(),
                });
            }

            event_bus.publish_guidance_event(GuidanceEvent::StreamValidationCompleted {
                consultation_id,
                verdict,
                validated_at: Utc::now(),
            });
            Ok(())
        });
    }

    fn record_memories(
        &self,
        consultation_id: ConsultationId,
        customer_text: String,
        customer_embedding: Vec<f32>,
        advisor_text: String,
    ) {
        let recorder = self.recorder.clone();
        self.pool.submit("memory_recording", move |cancel| async move {
            recorder
                .record_exchange(
                    consultation_id,
                    &customer_text,
                    Some(customer_embedding),
                    &advisor_text,
                    &cancel,
                )
                .await;
            Ok(())
        });
    }
}
