// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
#![allow(dead_code)]

use async_trait::async_trait;
use counsel_core::domain::config::CounselConfig;
use counsel_core::domain::consultation::{ConsultationId, CustomerProfile, GuidanceRequest};
use counsel_core::domain::llm::{
    ChatMessage, FinishReason, GenerationOptions, GenerationResponse, LLMError, LLMProvider, TextStream, TokenUsage,
};
use counsel_core::AdvisorService;
use counsel_cortex::{Embedder, EmbeddingError, HashEmbedder, KnowledgeBase};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub enum Reply {
    Text(String),
    Chunks(Vec<String>),
    Fail(LLMError),
    Hang,
}

pub fn text(reply: impl Into<String>) -> Reply {
    Reply::Text(reply.into())
}

pub fn chunks(parts: &[&str]) -> Reply {
    Reply::Chunks(parts.iter().map(|p| p.to_string()).collect())
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub options: GenerationOptions,
}

impl RecordedCall {
    pub fn user_prompt(&self) -> &str {
        self.messages.last().map(|m| m.content.as_str()).unwrap_or_default()
    }
}

const COMPLIANCE_PREAMBLE: &str = "You are a compliance officer";

/// Answers calls from a FIFO script and records what it was asked. A routed
/// provider answers compliance reviews from a second script, so background
/// validation cannot steal a reply meant for the next turn.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Reply>>,
    judge: Option<Mutex<VecDeque<Reply>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(replies.into_iter().collect()),
            judge: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn routed(replies: impl IntoIterator<Item = Reply>, verdicts: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(replies.into_iter().collect()),
            judge: Some(Mutex::new(verdicts.into_iter().collect())),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, reply: Reply) {
        self.script.lock().push_back(reply);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().len() + self.judge.as_ref().map(|j| j.lock().len()).unwrap_or(0)
    }

    /// Calls that were not compliance reviews, in order
    pub fn generation_calls(&self) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| !is_review(&c.messages)).collect()
    }

    fn next(&self, messages: &[ChatMessage], options: &GenerationOptions) -> Option<Reply> {
        self.calls.lock().push(RecordedCall {
            messages: messages.to_vec(),
            options: options.clone(),
        });
        match &self.judge {
            Some(judge) if is_review(messages) => judge.lock().pop_front(),
            _ => self.script.lock().pop_front(),
        }
    }
}

fn is_review(messages: &[ChatMessage]) -> bool {
    messages
        .first()
        .is_some_and(|m| m.content.starts_with(COMPLIANCE_PREAMBLE))
}

fn response(text: String) -> GenerationResponse {
    GenerationResponse {
        text,
        usage: TokenUsage::default(),
        provider: "scripted".into(),
        model: "scripted".into(),
        finish_reason: FinishReason::Stop,
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        match self.next(messages, options) {
            Some(Reply::Text(text)) => Ok(response(text)),
            Some(Reply::Chunks(parts)) => Ok(response(parts.concat())),
            Some(Reply::Fail(e)) => Err(e),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(LLMError::Network("hung".into()))
            }
            None => Err(LLMError::Provider("script exhausted".into())),
        }
    }

    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<TextStream, LLMError> {
        match self.next(messages, options) {
            Some(Reply::Chunks(parts)) => Ok(Box::pin(futures::stream::iter(parts.into_iter().map(Ok)))),
            Some(Reply::Text(text)) => Ok(Box::pin(futures::stream::once(async move { Ok(text) }))),
            Some(Reply::Fail(e)) => Err(e),
            Some(Reply::Hang) => Ok(Box::pin(futures::stream::pending())),
            None => Err(LLMError::Provider("script exhausted".into())),
        }
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        Ok(())
    }
}

pub fn verdict(all_pass: bool, confidence: f64, issues: &[&str]) -> Reply {
    let clarity = if all_pass {
        serde_json::json!({"passed": true})
    } else {
        serde_json::json!({"passed": false, "note": "uses unexplained jargon"})
    };
    let pass = serde_json::json!({"passed": true});
    text(
        serde_json::json!({
            "criteria": {
                "advice_boundary": pass,
                "risk_disclosure": pass,
                "clarity": clarity,
                "understanding_check": pass,
                "signposting": pass,
            },
            "confidence": confidence,
            "issues": issues,
        })
        .to_string(),
    )
}

pub fn service(llm: Arc<ScriptedProvider>, config: &CounselConfig) -> AdvisorService {
    service_with(llm, Arc::new(HashEmbedder::new(64)), KnowledgeBase::in_memory(), config)
}

pub fn service_with(
    llm: Arc<ScriptedProvider>,
    embedder: Arc<dyn Embedder>,
    knowledge: KnowledgeBase,
    config: &CounselConfig,
) -> AdvisorService {
    AdvisorService::new(llm, embedder, knowledge, config)
}

/// Embeds like a 64-bucket `HashEmbedder` until stalled, after which every
/// call waits for an hour.
pub struct StallingEmbedder {
    inner: HashEmbedder,
    stalled: AtomicBool,
}

impl StallingEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: HashEmbedder::new(64),
            stalled: AtomicBool::new(false),
        })
    }

    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Embedder for StallingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

pub fn request(consultation_id: ConsultationId, message: &str) -> GuidanceRequest {
    GuidanceRequest {
        consultation_id,
        customer: CustomerProfile::new("cust-42"),
        task_type: "pension_review".into(),
        message: message.into(),
    }
}
