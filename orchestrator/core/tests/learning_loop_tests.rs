// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod common;

use common::{request, service, service_with, text, verdict, Reply, ScriptedProvider, StallingEmbedder};
use counsel_core::domain::config::CounselConfig;
use counsel_core::domain::consultation::ConsultationId;
use counsel_core::domain::events::GuidanceEvent;
use counsel_core::domain::learning::{ConsultationOutcome, LearningReport, LearningStage};
use counsel_core::infrastructure::event_bus::DomainEvent;
use counsel_core::{AdvisorService, GuidanceError};
use counsel_cortex::{
    Embedder, HashEmbedder, InMemoryPersistentStore, KnowledgeBase, MemoryKind, RecencyDecay, Rule, RuleId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const QUESTION: &str = "I'm 58 and want a steady retirement income from my pension. What are my options?";
const ANSWER: &str = "You mentioned wanting certainty. An annuity pays a guaranteed income, drawdown keeps your pot invested. Does that make sense so far?";

fn outcome(successful: bool, conversational_quality: f64) -> ConsultationOutcome {
    ConsultationOutcome {
        successful,
        satisfaction: 0.9,
        comprehension: 0.6,
        goal_alignment: 0.9,
        conversational_quality,
        issues: if successful { vec![] } else { vec!["customer left confused".into()] },
    }
}

async fn seed_rule(advisor: &AdvisorService) -> RuleId {
    let embedding = HashEmbedder::new(64).embed("retirement income options").await.unwrap();
    advisor
        .knowledge()
        .rules
        .add(Rule::new("Compare annuity and drawdown side by side", "clarity", 0.5, embedding))
        .await
        .unwrap()
}

/// Run one passing turn so the consultation has a transcript.
async fn consult(llm: &ScriptedProvider, advisor: &AdvisorService) -> ConsultationId {
    llm.push(text(ANSWER));
    llm.push(verdict(true, 0.92, &[]));
    let id = ConsultationId::new();
    advisor
        .provide_guidance(&request(id, QUESTION), &CancellationToken::new())
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn test_success_stores_case_with_techniques() {
    let llm = ScriptedProvider::new([]);
    let advisor = service(llm.clone(), &CounselConfig::default());
    let id = consult(&llm, &advisor).await;

    llm.push(text("58-year-old wants guaranteed retirement income; compared annuity and drawdown."));
    let report = advisor
        .record_outcome(id, &outcome(true, 0.8), &CancellationToken::new())
        .await
        .unwrap();

    let LearningReport::CaseStored { case_id, recalibrated } = report else {
        panic!("expected a stored case, got {:?}", report);
    };
    assert!(recalibrated.is_empty());

    let case = advisor.knowledge().cases.get(case_id).unwrap();
    assert_eq!(case.task_type, "pension_review");
    assert_eq!(case.guidance_text, ANSWER);
    assert!((case.outcome.quality_score() - 0.8).abs() < 1e-9);
    let techniques = case.dialogue_techniques.expect("quality 0.8 keeps techniques");
    assert_eq!(techniques.engagement, vec!["Does that make sense so far?".to_string()]);
    assert_eq!(techniques.personalization, vec!["You mentioned wanting certainty.".to_string()]);

    assert!(advisor.consultation(id).is_none(), "recording the outcome closes the consultation");
}

#[tokio::test]
async fn test_low_conversational_quality_omits_techniques() {
    let llm = ScriptedProvider::new([]);
    let advisor = service(llm.clone(), &CounselConfig::default());
    let id = consult(&llm, &advisor).await;

    llm.push(text("Customer wanted income options."));
    let report = advisor
        .record_outcome(id, &outcome(true, 0.5), &CancellationToken::new())
        .await
        .unwrap();

    let LearningReport::CaseStored { case_id, .. } = report else {
        panic!("expected a stored case");
    };
    assert!(advisor.knowledge().cases.get(case_id).unwrap().dialogue_techniques.is_none());
}

#[tokio::test]
async fn test_invalid_principle_creates_no_rule() {
    let llm = ScriptedProvider::new([]);
    let advisor = service(llm.clone(), &CounselConfig::default());
    let id = consult(&llm, &advisor).await;
    let mut events = advisor.event_bus().subscribe_consultation(id);

    llm.push(text(r#"{"principle": "Tell customers to buy an annuity", "domain": "product"}"#));
    llm.push(text(r#"{"valid": false, "confidence": 0.9, "reason": "recommends a product"}"#));
    let report = advisor
        .record_outcome(id, &outcome(false, 0.4), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        report,
        LearningReport::RuleRejected {
            stage: LearningStage::ValidatePrinciple,
            reason: "recommends a product".into(),
            recalibrated: vec![],
        }
    );
    assert!(advisor.knowledge().rules.is_empty());
    assert_eq!(llm.remaining(), 0);

    let stage = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if let Ok(DomainEvent::Guidance(GuidanceEvent::LearningRejected { stage, .. })) = events.recv().await {
                return stage;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(stage, LearningStage::ValidatePrinciple);
}

#[tokio::test]
async fn test_generic_principle_rejected_at_judge_value() {
    let llm = ScriptedProvider::new([]);
    let advisor = service(llm.clone(), &CounselConfig::default());
    let id = consult(&llm, &advisor).await;

    llm.push(text(r#"{"principle": "Be clear", "domain": "clarity"}"#));
    llm.push(text(r#"{"valid": true, "confidence": 0.7, "reason": "stays within guidance"}"#));
    llm.push(text(r#"{"principle": "Be clear with customers"}"#));
    llm.push(text(r#"{"worth_keeping": false, "reason": "platitude"}"#));
    let report = advisor
        .record_outcome(id, &outcome(false, 0.4), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        report,
        LearningReport::RuleRejected { stage: LearningStage::JudgeValue, .. }
    ));
    assert!(advisor.knowledge().rules.is_empty());
}

#[tokio::test]
async fn test_failure_that_passes_every_gate_becomes_rule() {
    let llm = ScriptedProvider::new([]);
    let advisor = service(llm.clone(), &CounselConfig::default());
    let id = consult(&llm, &advisor).await;
    advisor.wait_for_background().await;

    llm.push(text(r#"{"principle": "Explain drawdown risk", "domain": "risk_disclosure"}"#));
    llm.push(text(r#"{"valid": true, "confidence": 0.75, "reason": "guidance only"}"#));
    llm.push(text(
        r#"{"principle": "When describing drawdown, state that the pot can run out and income is not guaranteed"}"#,
    ));
    llm.push(text(r#"{"worth_keeping": true, "reason": "specific and actionable"}"#));
    let report = advisor
        .record_outcome(id, &outcome(false, 0.4), &CancellationToken::new())
        .await
        .unwrap();

    let LearningReport::RuleCreated { rule_id, .. } = report else {
        panic!("expected a rule, got {:?}", report);
    };
    let rule = advisor.knowledge().rules.get(rule_id).unwrap();
    assert_eq!(
        rule.principle,
        "When describing drawdown, state that the pot can run out and income is not guaranteed"
    );
    assert_eq!(rule.domain, "risk_disclosure");
    assert_eq!(rule.confidence(), 0.75);
    assert_eq!(rule.supporting_evidence, vec![format!("consultation:{}", id)]);

    let reflections: Vec<_> = advisor
        .knowledge()
        .memories
        .all()
        .into_iter()
        .filter(|m| m.kind == MemoryKind::Reflection)
        .collect();
    assert_eq!(reflections.len(), 1);
    assert_eq!(reflections[0].description, rule.principle);
}

#[tokio::test]
async fn test_cited_rules_are_recalibrated() {
    let llm = ScriptedProvider::new([]);
    let advisor = service(llm.clone(), &CounselConfig::default());
    let rule_id = seed_rule(&advisor).await;

    let success = consult(&llm, &advisor).await;
    assert!(advisor.consultation(success).unwrap().cited_rules.contains(&rule_id));
    llm.push(text("Customer compared income options."));
    let report = advisor
        .record_outcome(success, &outcome(true, 0.8), &CancellationToken::new())
        .await
        .unwrap();

    let change = &report.recalibrated()[0];
    assert_eq!(change.rule_id, rule_id);
    assert!((change.old_confidence - 0.5).abs() < 1e-9);
    assert!((change.new_confidence - 0.54).abs() < 1e-9);

    let failure = consult(&llm, &advisor).await;
    llm.push(text(r#"{"principle": "Slow down", "domain": "pace"}"#));
    llm.push(text(r#"{"valid": false, "confidence": 0.2, "reason": "too vague"}"#));
    let report = advisor
        .record_outcome(failure, &outcome(false, 0.4), &CancellationToken::new())
        .await
        .unwrap();

    let change = &report.recalibrated()[0];
    assert!((change.new_confidence - 0.54 * (1.0 - 0.1 * 0.2)).abs() < 1e-9);

    let rule = advisor.knowledge().rules.get(rule_id).unwrap();
    assert_eq!(rule.performance.uses, 2);
    assert_eq!(rule.performance.successes, 1);
    assert_eq!(rule.performance.failures, 1);
    assert_eq!(rule.success_rate(), 0.5);
}

#[tokio::test]
async fn test_malformed_gate_response_keeps_consultation_open() {
    let llm = ScriptedProvider::new([]);
    let advisor = service(llm.clone(), &CounselConfig::default());
    let id = consult(&llm, &advisor).await;

    llm.push(text("I think the lesson is to be clearer."));
    let err = advisor
        .record_outcome(id, &outcome(false, 0.4), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GuidanceError::MalformedResponse { purpose: "reflect", .. }));
    assert!(advisor.consultation(id).is_some());
    assert!(advisor.knowledge().rules.is_empty());
}

#[tokio::test]
async fn test_unknown_consultation() {
    let llm = ScriptedProvider::new([]);
    let advisor = service(llm, &CounselConfig::default());
    let id = ConsultationId::new();

    let err = advisor
        .record_outcome(id, &outcome(true, 0.9), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GuidanceError::UnknownConsultation(missing) if missing == id));
}

#[tokio::test]
async fn test_retry_after_rule_store_outage_keeps_one_case() {
    let llm = ScriptedProvider::new([]);
    let rule_persistence = Arc::new(InMemoryPersistentStore::<Rule>::new());
    let knowledge = KnowledgeBase::with_persistence(
        Arc::new(InMemoryPersistentStore::new()),
        Arc::new(InMemoryPersistentStore::new()),
        rule_persistence.clone(),
        RecencyDecay::default(),
    );
    let advisor = service_with(llm.clone(), Arc::new(HashEmbedder::new(64)), knowledge, &CounselConfig::default());
    let rule_id = seed_rule(&advisor).await;
    let id = consult(&llm, &advisor).await;
    assert!(advisor.consultation(id).unwrap().cited_rules.contains(&rule_id));

    rule_persistence.set_fail_writes(true);
    llm.push(text("Customer compared income options."));
    let err = advisor
        .record_outcome(id, &outcome(true, 0.8), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GuidanceError::Storage(_)));
    assert!(advisor.consultation(id).is_some());
    assert_eq!(advisor.knowledge().cases.len(), 1);

    rule_persistence.set_fail_writes(false);
    let report = advisor
        .record_outcome(id, &outcome(true, 0.8), &CancellationToken::new())
        .await
        .unwrap();

    let LearningReport::CaseStored { case_id, recalibrated } = report else {
        panic!("expected the stored case, got {:?}", report);
    };
    assert_eq!(advisor.knowledge().cases.len(), 1);
    assert!(advisor.knowledge().cases.get(case_id).is_some());
    assert_eq!(recalibrated.len(), 1);
    assert_eq!(advisor.knowledge().rules.get(rule_id).unwrap().performance.uses, 1);
    assert_eq!(llm.remaining(), 0, "the retry needs no generation");
    assert!(advisor.consultation(id).is_none());
}

#[tokio::test]
async fn test_retry_after_failed_rule_write_creates_rule_once() {
    let llm = ScriptedProvider::new([]);
    let rule_persistence = Arc::new(InMemoryPersistentStore::<Rule>::new());
    let knowledge = KnowledgeBase::with_persistence(
        Arc::new(InMemoryPersistentStore::new()),
        Arc::new(InMemoryPersistentStore::new()),
        rule_persistence.clone(),
        RecencyDecay::default(),
    );
    let advisor = service_with(llm.clone(), Arc::new(HashEmbedder::new(64)), knowledge, &CounselConfig::default());
    let seeded = seed_rule(&advisor).await;
    let id = consult(&llm, &advisor).await;

    let gate = || {
        [
            text(r#"{"principle": "Explain drawdown risk", "domain": "risk_disclosure"}"#),
            text(r#"{"valid": true, "confidence": 0.75, "reason": "guidance only"}"#),
            text(r#"{"principle": "When describing drawdown, say the pot can run out"}"#),
            text(r#"{"worth_keeping": true, "reason": "specific"}"#),
        ]
    };
    rule_persistence.set_fail_writes(true);
    for reply in gate() {
        llm.push(reply);
    }
    let err = advisor
        .record_outcome(id, &outcome(false, 0.4), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GuidanceError::Storage(_)));
    assert_eq!(advisor.knowledge().rules.len(), 1);

    rule_persistence.set_fail_writes(false);
    for reply in gate() {
        llm.push(reply);
    }
    let report = advisor
        .record_outcome(id, &outcome(false, 0.4), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(report, LearningReport::RuleCreated { .. }));
    assert_eq!(advisor.knowledge().rules.len(), 2);
    assert_eq!(advisor.knowledge().rules.get(seeded).unwrap().performance.uses, 1);
}

fn knowledge_counts(advisor: &AdvisorService) -> (usize, usize, usize) {
    let knowledge = advisor.knowledge();
    (knowledge.rules.len(), knowledge.cases.len(), knowledge.memories.len())
}

/// Record an outcome whose learning blocks on the last scripted reply, or on
/// the embedder when `stall_embedding` is set, and cancel it after 50ms.
async fn cancel_learning_midway(replies: Vec<Reply>, successful: bool, stall_embedding: bool) {
    let llm = ScriptedProvider::new([]);
    let embedder = StallingEmbedder::new();
    let advisor = service_with(
        llm.clone(),
        embedder.clone(),
        KnowledgeBase::in_memory(),
        &CounselConfig::default(),
    );
    let rule_id = seed_rule(&advisor).await;
    let id = consult(&llm, &advisor).await;
    advisor.wait_for_background().await;
    let before = knowledge_counts(&advisor);

    for reply in replies {
        llm.push(reply);
    }
    if stall_embedding {
        embedder.stall();
    }
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        advisor.record_outcome(id, &outcome(successful, 0.4), &cancel),
    )
    .await
    .expect("cancelled learning should return promptly");

    assert!(matches!(result, Err(GuidanceError::Cancelled)));
    assert_eq!(llm.remaining(), 0, "learning reached the blocking stage");
    advisor.wait_for_background().await;
    assert_eq!(knowledge_counts(&advisor), before);
    assert_eq!(advisor.knowledge().rules.get(rule_id).unwrap().performance.uses, 0);
    assert!(advisor.consultation(id).is_some());
}

fn proposal() -> Reply {
    text(r#"{"principle": "Explain drawdown risk", "domain": "risk_disclosure"}"#)
}

fn valid_principle() -> Reply {
    text(r#"{"valid": true, "confidence": 0.75, "reason": "guidance only"}"#)
}

fn refined() -> Reply {
    text(r#"{"principle": "When describing drawdown, say the pot can run out"}"#)
}

#[tokio::test]
async fn test_cancel_during_reflect_leaves_knowledge_untouched() {
    cancel_learning_midway(vec![Reply::Hang], false, false).await;
}

#[tokio::test]
async fn test_cancel_during_principle_validation_leaves_knowledge_untouched() {
    cancel_learning_midway(vec![proposal(), Reply::Hang], false, false).await;
}

#[tokio::test]
async fn test_cancel_during_refine_leaves_knowledge_untouched() {
    cancel_learning_midway(vec![proposal(), valid_principle(), Reply::Hang], false, false).await;
}

#[tokio::test]
async fn test_cancel_during_value_judgement_leaves_knowledge_untouched() {
    cancel_learning_midway(vec![proposal(), valid_principle(), refined(), Reply::Hang], false, false).await;
}

#[tokio::test]
async fn test_cancel_during_principle_embedding_leaves_knowledge_untouched() {
    let worth_keeping = text(r#"{"worth_keeping": true, "reason": "specific"}"#);
    cancel_learning_midway(vec![proposal(), valid_principle(), refined(), worth_keeping], false, true).await;
}

#[tokio::test]
async fn test_cancel_during_summary_embedding_leaves_knowledge_untouched() {
    cancel_learning_midway(vec![text("Customer compared income options.")], true, true).await;
}

#[tokio::test]
async fn test_abandoned_consultation_learns_nothing() {
    let llm = ScriptedProvider::new([]);
    let advisor = service(llm.clone(), &CounselConfig::default());
    let rule_id = seed_rule(&advisor).await;
    let id = consult(&llm, &advisor).await;

    advisor.abandon_consultation(id).await.unwrap();

    assert!(advisor.consultation(id).is_none());
    assert!(advisor.knowledge().cases.is_empty());
    assert_eq!(advisor.knowledge().rules.get(rule_id).unwrap().performance.uses, 0);
    let err = advisor
        .record_outcome(id, &outcome(true, 0.8), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GuidanceError::UnknownConsultation(_)));
}

#[tokio::test]
async fn test_idle_consultations_are_evicted() {
    let llm = ScriptedProvider::new([]);
    let advisor = service(llm.clone(), &CounselConfig::default());
    let id = consult(&llm, &advisor).await;

    assert_eq!(advisor.evict_idle_consultations(Duration::from_secs(3600)), 0);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(advisor.evict_idle_consultations(Duration::from_millis(10)), 1);
    assert!(advisor.consultation(id).is_none());
}
