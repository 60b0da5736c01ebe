// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod common;

use common::{request, service, text, verdict, Reply, ScriptedProvider};
use counsel_core::domain::compliance::Route;
use counsel_core::domain::config::CounselConfig;
use counsel_core::domain::consultation::{ConsultationId, Speaker};
use counsel_core::domain::events::GuidanceEvent;
use counsel_core::infrastructure::event_bus::DomainEvent;
use counsel_core::GuidanceError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const QUESTION: &str = "I'm 58 and worried my pension won't give me enough income. What are my options?";

#[tokio::test]
async fn test_passing_draft_is_returned_unchanged() {
    let llm = ScriptedProvider::new([text("You could consider an annuity or drawdown."), verdict(true, 0.92, &[])]);
    let advisor = service(llm.clone(), &CounselConfig::default());
    let id = ConsultationId::new();

    let reply = advisor
        .provide_guidance(&request(id, QUESTION), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply.route, Route::Return);
    assert_eq!(reply.text, "You could consider an annuity or drawdown.");
    assert_eq!(reply.generation_calls, 2);
    assert!(!reply.borderline);
    assert!(reply.reasoning.is_none());
    assert_eq!(llm.call_count(), 2);

    let record = advisor.consultation(id).unwrap();
    assert_eq!(record.transcript.len(), 2);
    assert_eq!(record.transcript[0].speaker, Speaker::Customer);
    assert_eq!(record.transcript[1].text, reply.text);
}

#[tokio::test]
async fn test_borderline_pass_still_returns() {
    let llm = ScriptedProvider::new([text("Draft"), verdict(true, 0.78, &[])]);
    let advisor = service(llm.clone(), &CounselConfig::default());

    let reply = advisor
        .provide_guidance(&request(ConsultationId::new(), QUESTION), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply.route, Route::Return);
    assert!(reply.borderline);
    assert!(!reply.verdict.requires_human_review);
}

#[tokio::test]
async fn test_failed_draft_gets_exactly_one_refinement() {
    let llm = ScriptedProvider::new([
        text("Put everything in drawdown."),
        verdict(false, 0.8, &["reads as a personal recommendation"]),
        text("Some people choose drawdown, others an annuity. A regulated adviser can help."),
        // Never consumed: the refined text is not validated again
        verdict(false, 0.1, &[]),
    ]);
    let advisor = service(llm.clone(), &CounselConfig::default());

    let reply = advisor
        .provide_guidance(&request(ConsultationId::new(), QUESTION), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply.route, Route::Refine);
    assert_eq!(
        reply.text,
        "Some people choose drawdown, others an annuity. A regulated adviser can help."
    );
    assert_eq!(reply.generation_calls, 3);
    assert_eq!(llm.call_count(), 3);
    assert_eq!(llm.remaining(), 1);

    let refine_prompt = llm.calls()[2].user_prompt().to_string();
    assert!(refine_prompt.contains("Put everything in drawdown."));
    assert!(refine_prompt.contains("reads as a personal recommendation"));
    assert!(refine_prompt.contains("clarity: uses unexplained jargon"));
}

#[tokio::test]
async fn test_low_confidence_pass_is_strengthened_cooler() {
    let llm = ScriptedProvider::new([text("Draft"), verdict(true, 0.60, &["thin risk disclosure"]), text("Stronger")]);
    let advisor = service(llm.clone(), &CounselConfig::default());

    let reply = advisor
        .provide_guidance(&request(ConsultationId::new(), QUESTION), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply.route, Route::Strengthen);
    assert!(reply.verdict.passed);
    assert!(reply.verdict.requires_human_review);
    assert_eq!(reply.text, "Stronger");
    assert_eq!(reply.generation_calls, 3);

    let calls = llm.calls();
    let draft_temperature = calls[0].options.temperature.unwrap();
    let strengthen_temperature = calls[2].options.temperature.unwrap();
    assert!((draft_temperature - 0.7).abs() < 1e-6);
    assert!((strengthen_temperature - 0.5).abs() < 1e-6);
    assert_eq!(calls[2].options.max_tokens, calls[0].options.max_tokens);
    assert!(calls[2].user_prompt().contains("thin risk disclosure"));
}

#[tokio::test]
async fn test_chain_of_thought_adds_reasoning_call() {
    let mut config = CounselConfig::default();
    config.spec.orchestration.chain_of_thought = true;
    let llm = ScriptedProvider::new([
        text("They need income certainty; annuity vs drawdown trade-off."),
        text("Draft"),
        verdict(true, 0.95, &[]),
    ]);
    let advisor = service(llm.clone(), &config);

    let reply = advisor
        .provide_guidance(&request(ConsultationId::new(), QUESTION), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply.generation_calls, 3);
    assert_eq!(
        reply.reasoning.as_deref(),
        Some("They need income certainty; annuity vs drawdown trade-off.")
    );
    assert!(llm.calls()[1].user_prompt().contains("Your earlier reasoning"));
}

#[tokio::test]
async fn test_chain_of_thought_worst_case_is_four_calls() {
    let mut config = CounselConfig::default();
    config.spec.orchestration.chain_of_thought = true;
    let llm = ScriptedProvider::new([
        text("They want certainty."),
        text("Put everything in drawdown."),
        verdict(false, 0.8, &["reads as a personal recommendation"]),
        text("Some people choose drawdown, others an annuity."),
        verdict(false, 0.1, &[]),
    ]);
    let advisor = service(llm.clone(), &config);

    let reply = advisor
        .provide_guidance(&request(ConsultationId::new(), QUESTION), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply.route, Route::Refine);
    assert_eq!(reply.generation_calls, 4);
    assert_eq!(llm.call_count(), 4);
    assert_eq!(llm.remaining(), 1);
}

#[tokio::test]
async fn test_unparseable_verdict_fails_the_turn() {
    let llm = ScriptedProvider::new([text("Draft"), text("Looks compliant to me!")]);
    let advisor = service(llm.clone(), &CounselConfig::default());
    let id = ConsultationId::new();

    let err = advisor
        .provide_guidance(&request(id, QUESTION), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GuidanceError::MalformedResponse { purpose: "compliance", .. }));
    assert!(advisor.consultation(id).unwrap().transcript.is_empty());
}

#[tokio::test]
async fn test_cancelled_turn_appends_nothing() {
    let llm = ScriptedProvider::new([Reply::Hang]);
    let advisor = service(llm.clone(), &CounselConfig::default());
    let id = ConsultationId::new();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = advisor.provide_guidance(&request(id, QUESTION), &cancel).await.unwrap_err();
    assert!(matches!(err, GuidanceError::Cancelled));
    assert!(advisor.consultation(id).unwrap().transcript.is_empty());
}

#[tokio::test]
async fn test_turn_completed_event_names_route() {
    let llm = ScriptedProvider::new([text("Draft"), verdict(false, 0.9, &[]), text("Fixed")]);
    let advisor = service(llm, &CounselConfig::default());
    let id = ConsultationId::new();
    let mut events = advisor.event_bus().subscribe_consultation(id);

    advisor
        .provide_guidance(&request(id, QUESTION), &CancellationToken::new())
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if let DomainEvent::Guidance(GuidanceEvent::TurnCompleted { route, streamed, .. }) =
                events.recv().await.unwrap()
            {
                return (route, streamed);
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(event, (Some(Route::Refine), false));
}

#[tokio::test]
async fn test_memories_recorded_in_background() {
    let llm = ScriptedProvider::new([text("Ok."), verdict(true, 0.9, &[])]);
    let advisor = service(llm, &CounselConfig::default());

    advisor
        .provide_guidance(&request(ConsultationId::new(), QUESTION), &CancellationToken::new())
        .await
        .unwrap();
    advisor.wait_for_background().await;

    let memories = advisor.knowledge().memories.all();
    assert_eq!(memories.len(), 1, "only the customer statement clears its floor");
    assert_eq!(memories[0].description, QUESTION);
}
