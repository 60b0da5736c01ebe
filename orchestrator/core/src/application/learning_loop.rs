// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Learning Loop
//!
//! Turns a finished consultation into knowledge.
//!
//! - **Success:** summarise the situation and store the consultation as a
//!   [`Case`], with dialogue techniques when the conversation itself was good.
//! - **Failure:** Reflect → ValidatePrinciple → RefinePrinciple → JudgeValue.
//!   A [`Rule`] is created only when every stage passes; a rejection stops
//!   the gate and is reported, not raised.
//!
//! Either way every rule the consultation cited is recalibrated against the
//! outcome. All generation and embedding calls finish before anything is
//! written, so a cancelled or failed call leaves the knowledge base
//! untouched. Each committed write is noted on the consultation's ledger
//! entry, and a later attempt resumes after it instead of writing again.

use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use counsel_cortex::{
    Case, CaseId, CortexError, CortexEvent, Embedder, KnowledgeBase, MemoryItem, MemoryKind, Rule, RuleId,
};

use super::generation::Generator;
use super::ledger::{ConsultationRecord, TurnGuard};
use crate::domain::config::LearningConfig;
use crate::domain::consultation::{texts_by, Speaker};
use crate::domain::error::GuidanceError;
use crate::domain::events::GuidanceEvent;
use crate::domain::learning::{
    extract_dialogue_techniques, parse_principle_validation, parse_proposal, parse_refined_principle, parse_summary,
    parse_value_judgement, ConsultationOutcome, LearnedLesson, LearningReport, LearningStage, RuleRecalibration,
};
use crate::domain::llm::GenerationOptions;
use crate::domain::prompt::PromptRequest;
use crate::infrastructure::event_bus::EventBus;

/// What the generation phase decided, before anything is persisted
enum Draft {
    Case(Case),
    Rule(Rule),
    Rejected { stage: LearningStage, reason: String },
}

pub struct LearningLoop {
    generator: Arc<Generator>,
    knowledge: KnowledgeBase,
    embedder: Arc<dyn Embedder>,
    options: GenerationOptions,
    learning_rate: f64,
    technique_quality_floor: f64,
    event_bus: EventBus,
}

impl LearningLoop {
    pub fn new(
        generator: Arc<Generator>,
        knowledge: KnowledgeBase,
        embedder: Arc<dyn Embedder>,
        config: &LearningConfig,
        event_bus: EventBus,
    ) -> Self {
        Self {
            generator,
            knowledge,
            embedder,
            options: GenerationOptions {
                max_tokens: Some(config.max_tokens),
                temperature: Some(config.temperature),
                stop_sequences: None,
            },
            learning_rate: config.learning_rate,
            technique_quality_floor: config.technique_quality_floor,
            event_bus,
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Learn from the consultation held by `turn`. Work committed by an
    /// earlier failed attempt is reused, not repeated.
    pub async fn learn(
        &self,
        turn: &TurnGuard,
        outcome: &ConsultationOutcome,
        cancel: &CancellationToken,
    ) -> Result<LearningReport, GuidanceError> {
        let record = turn.record();
        let lesson = match turn.learning_progress().lesson {
            Some(lesson) => {
                debug!(consultation_id = %record.consultation_id, ?lesson, "Resuming learning after committed lesson");
                lesson
            }
            None => {
                let draft = if outcome.successful {
                    self.draft_case(&record, outcome, cancel).await?
                } else {
                    self.draft_rule(&record, outcome, cancel).await?
                };
                if cancel.is_cancelled() {
                    return Err(GuidanceError::Cancelled);
                }
                let lesson = self.commit(&record, draft).await?;
                turn.note_lesson(lesson.clone());
                lesson
            }
        };

        let recalibrated = self.recalibrate(turn, &record, outcome).await?;
        Ok(lesson.into_report(recalibrated))
    }

    async fn commit(&self, record: &ConsultationRecord, draft: Draft) -> Result<LearnedLesson, GuidanceError> {
        match draft {
            Draft::Case(case) => Ok(LearnedLesson::CaseStored(self.store_case(record, case).await?)),
            Draft::Rule(rule) => Ok(LearnedLesson::RuleCreated(self.store_rule(record, rule).await?)),
            Draft::Rejected { stage, reason } => {
                let consultation_id = record.consultation_id;
                counter!("counsel_learning_gate_rejections_total", "stage" => stage.as_str()).increment(1);
                info!(%consultation_id, stage = stage.as_str(), reason = %reason, "Learning gate rejected principle");
                self.event_bus.publish_guidance_event(GuidanceEvent::LearningRejected {
                    consultation_id,
                    stage,
                    reason: reason.clone(),
                    rejected_at: Utc::now(),
                });
                Ok(LearnedLesson::RuleRejected { stage, reason })
            }
        }
    }

    async fn embed(&self, text: &str, cancel: &CancellationToken) -> Result<Vec<f32>, GuidanceError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GuidanceError::Cancelled),
            embedding = self.embedder.embed(text) => Ok(embedding?),
        }
    }

    async fn draft_case(
        &self,
        record: &ConsultationRecord,
        outcome: &ConsultationOutcome,
        cancel: &CancellationToken,
    ) -> Result<Draft, GuidanceError> {
        let summary = self
            .generator
            .complete_parsed(
                &PromptRequest::SituationSummary {
                    task_type: &record.task_type,
                    customer: &record.customer,
                    transcript: &record.transcript,
                },
                &self.options,
                cancel,
                parse_summary,
            )
            .await?;
        let embedding = self.embed(&summary, cancel).await?;

        let advisor_turns = texts_by(&record.transcript, Speaker::Advisor);
        let mut case = Case::new(
            record.task_type.as_str(),
            summary,
            advisor_turns.join("\n\n"),
            outcome.to_case_outcome(),
            embedding,
        );
        if outcome.conversational_quality >= self.technique_quality_floor {
            let techniques = extract_dialogue_techniques(&advisor_turns);
            if !techniques.is_empty() {
                case = case.with_dialogue_techniques(techniques);
            }
        }
        Ok(Draft::Case(case))
    }

    async fn draft_rule(
        &self,
        record: &ConsultationRecord,
        outcome: &ConsultationOutcome,
        cancel: &CancellationToken,
    ) -> Result<Draft, GuidanceError> {
        let proposal = self
            .generator
            .complete_parsed(
                &PromptRequest::Reflect {
                    task_type: &record.task_type,
                    transcript: &record.transcript,
                    outcome,
                },
                &self.options,
                cancel,
                parse_proposal,
            )
            .await?;
        debug!(consultation_id = %record.consultation_id, domain = %proposal.domain, "Reflected on failure");

        let validation = self
            .generator
            .complete_parsed(
                &PromptRequest::ValidatePrinciple { proposal: &proposal },
                &self.options,
                cancel,
                parse_principle_validation,
            )
            .await?;
        if !validation.valid {
            return Ok(Draft::Rejected {
                stage: LearningStage::ValidatePrinciple,
                reason: validation.reason,
            });
        }

        let principle = self
            .generator
            .complete_parsed(
                &PromptRequest::RefinePrinciple {
                    proposal: &proposal,
                    transcript: &record.transcript,
                },
                &self.options,
                cancel,
                parse_refined_principle,
            )
            .await?;

        let judgement = self
            .generator
            .complete_parsed(
                &PromptRequest::JudgeValue {
                    principle: &principle,
                    domain: &proposal.domain,
                },
                &self.options,
                cancel,
                parse_value_judgement,
            )
            .await?;
        if !judgement.worth_keeping {
            return Ok(Draft::Rejected {
                stage: LearningStage::JudgeValue,
                reason: judgement.reason,
            });
        }

        let embedding = self.embed(&principle, cancel).await?;
        let rule = Rule::new(principle, proposal.domain, validation.confidence, embedding)
            .with_evidence(format!("consultation:{}", record.consultation_id));
        Ok(Draft::Rule(rule))
    }

    async fn store_case(&self, record: &ConsultationRecord, case: Case) -> Result<CaseId, GuidanceError> {
        let quality = case.outcome.quality_score();
        let has_dialogue_techniques = case.dialogue_techniques.is_some();
        let case_id = self.knowledge.cases.add(case).await?;

        counter!("counsel_cases_created_total").increment(1);
        self.event_bus.publish_cortex_event(CortexEvent::CaseStored {
            case_id,
            consultation_id: Some(record.consultation_id.0),
            task_type: record.task_type.clone(),
            quality,
            has_dialogue_techniques,
            timestamp: Utc::now(),
        });
        info!(consultation_id = %record.consultation_id, %case_id, quality, "Stored case");
        Ok(case_id)
    }

    async fn store_rule(&self, record: &ConsultationRecord, rule: Rule) -> Result<RuleId, GuidanceError> {
        let consultation_id = record.consultation_id;
        let confidence = rule.confidence();
        let domain = rule.domain.clone();
        let reflection = MemoryItem::new(
            rule.principle.as_str(),
            MemoryKind::Reflection,
            confidence,
            rule.embedding.clone(),
        )
        .with_citation(format!("consultation:{}", consultation_id));

        let rule_id = self.knowledge.rules.add(rule).await?;
        counter!("counsel_rules_created_total").increment(1);
        self.event_bus.publish_cortex_event(CortexEvent::RuleCreated {
            rule_id,
            consultation_id: Some(consultation_id.0),
            domain: domain.clone(),
            confidence,
            timestamp: Utc::now(),
        });
        info!(%consultation_id, %rule_id, domain = %domain, confidence, "Created rule");

        match self.knowledge.memories.add(reflection).await {
            Ok(memory_id) => self.event_bus.publish_cortex_event(CortexEvent::MemoryRecorded {
                memory_id,
                consultation_id: Some(consultation_id.0),
                kind: MemoryKind::Reflection,
                importance: confidence,
                timestamp: Utc::now(),
            }),
            Err(e) => {
                counter!("counsel_memory_write_failures_total").increment(1);
                warn!(%consultation_id, %rule_id, error = %e, "Failed to record reflection");
            }
        }
        Ok(rule_id)
    }

    /// Apply the outcome to every rule the consultation cited. Rules that
    /// no longer exist are skipped, as are rules an earlier attempt already
    /// updated.
    async fn recalibrate(
        &self,
        turn: &TurnGuard,
        record: &ConsultationRecord,
        outcome: &ConsultationOutcome,
    ) -> Result<Vec<RuleRecalibration>, GuidanceError> {
        let success = outcome.successful;
        let quality = outcome.quality_score();
        let learning_rate = self.learning_rate;
        let progress = turn.learning_progress();
        let mut recalibrated = Vec::with_capacity(record.cited_rules.len());

        for &rule_id in &record.cited_rules {
            if let Some(done) = progress.recalibration_of(rule_id) {
                recalibrated.push(done.clone());
                continue;
            }
            let (rule, change) = match self
                .knowledge
                .rules
                .update(rule_id, move |rule| rule.record_outcome(success, quality, learning_rate))
                .await
            {
                Ok(updated) => updated,
                Err(CortexError::NotFound { .. }) => {
                    warn!(consultation_id = %record.consultation_id, %rule_id, "Cited rule no longer exists");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            self.event_bus.publish_cortex_event(CortexEvent::RuleConfidenceUpdated {
                rule_id,
                consultation_id: Some(record.consultation_id.0),
                success,
                old_confidence: change.old,
                new_confidence: change.new,
                uses: rule.performance.uses,
                timestamp: Utc::now(),
            });
            debug!(%rule_id, old = change.old, new = change.new, "Recalibrated rule");
            let recalibration = RuleRecalibration {
                rule_id,
                old_confidence: change.old,
                new_confidence: change.new,
            };
            turn.note_recalibration(recalibration.clone());
            recalibrated.push(recalibration);
        }
        Ok(recalibrated)
    }
}
