// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Generation
//!
//! Single entry point for every LLM call the core makes: builds the prompt,
//! counts the call, races it against the caller's cancellation token and
//! maps failures into [`GuidanceError`].

use metrics::counter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::error::GuidanceError;
use crate::domain::llm::{ChatMessage, GenerationOptions, LLMProvider, TextStream};
use crate::domain::parsing::ParseError;
use crate::domain::prompt::{GenerationPurpose, PromptBuilder, PromptRequest};

#[derive(Clone)]
pub struct Generator {
    llm: Arc<dyn LLMProvider>,
    prompts: Arc<dyn PromptBuilder>,
}

impl Generator {
    pub fn new(llm: Arc<dyn LLMProvider>, prompts: Arc<dyn PromptBuilder>) -> Self {
        Self { llm, prompts }
    }

    fn prepare(&self, request: &PromptRequest<'_>) -> Result<(GenerationPurpose, Vec<ChatMessage>), GuidanceError> {
        let purpose = request.purpose();
        let messages = self
            .prompts
            .build(request)
            .map_err(|e| GuidanceError::Prompt(format!("{}: {}", purpose.as_str(), e)))?;
        counter!("counsel_generation_calls_total", "purpose" => purpose.as_str()).increment(1);
        debug!(purpose = purpose.as_str(), messages = messages.len(), "Generating");
        Ok((purpose, messages))
    }

    /// Run one generation call to completion and return its text.
    pub async fn complete(
        &self,
        request: &PromptRequest<'_>,
        options: &GenerationOptions,
        cancel: &CancellationToken,
    ) -> Result<String, GuidanceError> {
        if cancel.is_cancelled() {
            return Err(GuidanceError::Cancelled);
        }
        let (purpose, messages) = self.prepare(request)?;

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GuidanceError::Cancelled),
            response = self.llm.generate(&messages, options) => response,
        };

        response
            .map(|r| r.text)
            .map_err(|source| GuidanceError::Generation {
                purpose: purpose.as_str(),
                source,
            })
    }

    /// Run one generation call and parse its text strictly. Unparseable
    /// output is a [`GuidanceError::MalformedResponse`], never a default.
    pub async fn complete_parsed<T, F>(
        &self,
        request: &PromptRequest<'_>,
        options: &GenerationOptions,
        cancel: &CancellationToken,
        parse: F,
    ) -> Result<T, GuidanceError>
    where
        F: FnOnce(&str) -> Result<T, ParseError>,
    {
        let purpose = request.purpose();
        let text = self.complete(request, options, cancel).await?;
        parse(&text).map_err(|source| GuidanceError::MalformedResponse {
            purpose: purpose.as_str(),
            source,
        })
    }

    /// Open a fragment stream. Cancellation only covers opening the stream;
    /// the consumer owns it afterwards and stops by dropping it.
    pub async fn stream(
        &self,
        request: &PromptRequest<'_>,
        options: &GenerationOptions,
        cancel: &CancellationToken,
    ) -> Result<TextStream, GuidanceError> {
        if cancel.is_cancelled() {
            return Err(GuidanceError::Cancelled);
        }
        let (purpose, messages) = self.prepare(request)?;

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GuidanceError::Cancelled),
            stream = self.llm.generate_stream(&messages, options) => stream,
        };

        stream.map_err(|source| GuidanceError::Generation {
            purpose: purpose.as_str(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::{FinishReason, GenerationResponse, LLMError, TokenUsage};
    use crate::domain::learning::parse_value_judgement;
    use crate::domain::prompt::PromptError;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Fixed(&'static str);

    #[async_trait]
    impl LLMProvider for Fixed {
        async fn generate(
            &self,
            _messages: &[ChatMessage],
            _options: &GenerationOptions,
        ) -> Result<GenerationResponse, LLMError> {
            Ok(GenerationResponse {
                text: self.0.to_string(),
                usage: TokenUsage::default(),
                provider: "fixed".into(),
                model: "fixed".into(),
                finish_reason: FinishReason::Stop,
            })
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    struct Hanging;

    #[async_trait]
    impl LLMProvider for Hanging {
        async fn generate(
            &self,
            _messages: &[ChatMessage],
            _options: &GenerationOptions,
        ) -> Result<GenerationResponse, LLMError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(LLMError::Network("unreachable".into()))
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    struct Echo;

    impl PromptBuilder for Echo {
        fn build(&self, request: &PromptRequest<'_>) -> Result<Vec<ChatMessage>, PromptError> {
            Ok(vec![ChatMessage::user(request.purpose().as_str())])
        }
    }

    fn judge() -> PromptRequest<'static> {
        PromptRequest::JudgeValue {
            principle: "p",
            domain: "d",
        }
    }

    #[tokio::test]
    async fn test_parsed_completion() {
        let generator = Generator::new(
            Arc::new(Fixed(r#"{"worth_keeping": true, "reason": "specific"}"#)),
            Arc::new(Echo),
        );
        let judgement = generator
            .complete_parsed(&judge(), &GenerationOptions::default(), &CancellationToken::new(), parse_value_judgement)
            .await
            .unwrap();
        assert!(judgement.worth_keeping);
    }

    #[tokio::test]
    async fn test_unparseable_output_is_malformed() {
        let generator = Generator::new(Arc::new(Fixed("Sure, keep it!")), Arc::new(Echo));
        let err = generator
            .complete_parsed(&judge(), &GenerationOptions::default(), &CancellationToken::new(), parse_value_judgement)
            .await
            .unwrap_err();
        assert!(matches!(err, GuidanceError::MalformedResponse { purpose: "judge_value", .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_cancellation_abandons_call() {
        let generator = Generator::new(Arc::new(Hanging), Arc::new(Echo));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = generator
            .complete(&judge(), &GenerationOptions::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, GuidanceError::Cancelled));
    }

    #[tokio::test]
    async fn test_already_cancelled_never_calls_provider() {
        let generator = Generator::new(Arc::new(Hanging), Arc::new(Echo));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            generator.stream(&judge(), &GenerationOptions::default(), &cancel).await,
            Err(GuidanceError::Cancelled)
        ));
    }
}
