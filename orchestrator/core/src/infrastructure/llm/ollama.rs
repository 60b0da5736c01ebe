// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Ollama LLM Provider Adapter
//
// Anti-Corruption Layer for Ollama local models (`/api/chat`).
// Supports air-gapped deployments with local LLMs. Streaming responses are
// newline-delimited JSON objects, the last one carrying `done: true`.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::{body_lines, error_for_status};
use crate::domain::llm::{
    ChatMessage, FinishReason, GenerationOptions, GenerationResponse, LLMError, LLMProvider, TextStream, TokenUsage,
};

pub struct OllamaAdapter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions<'a>,
}

#[derive(Serialize)]
struct OllamaOptions<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    eval_count: Option<u32>,
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

impl OllamaAdapter {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
        }
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
        stream: bool,
    ) -> Result<reqwest::Response, LLMError> {
        let request = OllamaRequest {
            model: &self.model,
            messages,
            stream,
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
                stop: options.stop_sequences.as_deref(),
            },
        };

        let url = format!("{}/api/chat", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_for_status(response, &self.model).await);
        }
        Ok(response)
    }
}

fn parse_line(line: &str) -> Result<OllamaChatResponse, LLMError> {
    let parsed: OllamaChatResponse = serde_json::from_str(line)
        .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;
    match parsed.error {
        Some(error) => Err(LLMError::Provider(error)),
        None => Ok(parsed),
    }
}

#[async_trait]
impl LLMProvider for OllamaAdapter {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        let response = self.send(messages, options, false).await?;
        let body = response.text().await.map_err(|e| LLMError::Network(e.to_string()))?;
        let ollama_response = parse_line(&body)?;

        let prompt_tokens = ollama_response.prompt_eval_count.unwrap_or(0);
        let completion_tokens = ollama_response.eval_count.unwrap_or(0);

        Ok(GenerationResponse {
            text: ollama_response.message.map(|m| m.content).unwrap_or_default(),
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            provider: "ollama".to_string(),
            model: self.model.clone(),
            finish_reason: match (ollama_response.done, ollama_response.done_reason.as_deref()) {
                (_, Some("length")) | (false, _) => FinishReason::Length,
                _ => FinishReason::Stop,
            },
        })
    }

    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<TextStream, LLMError> {
        let response = self.send(messages, options, true).await?;
        let mut lines = Box::pin(body_lines(response));

        let fragments = async_stream::try_stream! {
            while let Some(line) = lines.next().await {
                let chunk = parse_line(&line?)?;
                if let Some(message) = chunk.message.filter(|m| !m.content.is_empty()) {
                    yield message.content;
                }
                if chunk.done {
                    break;
                }
            }
        };
        Ok(Box::pin(fragments))
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        // Check if Ollama server is running by listing models
        let url = format!("{}/api/tags", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LLMError::Network(format!("HTTP {}", response.status())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/chat")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "llama3.2",
                "stream": false,
                "messages": [{"role": "user", "content": "hi"}]
            })))
            .with_status(200)
            .with_body(r#"{"message":{"role":"assistant","content":"Hello."},"done":true,"eval_count":3,"prompt_eval_count":5}"#)
            .create_async()
            .await;

        let adapter = OllamaAdapter::new(server.url(), "llama3.2");
        let response = adapter
            .generate(&[ChatMessage::user("hi")], &GenerationOptions::default())
            .await
            .unwrap();

        assert_eq!(response.text, "Hello.");
        assert_eq!(response.usage.total_tokens, 8);
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn test_generate_stream_ndjson() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"lo.\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
        );
        server
            .mock("POST", "/api/chat")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let adapter = OllamaAdapter::new(server.url(), "llama3.2");
        let fragments: Vec<String> = adapter
            .generate_stream(&[ChatMessage::user("hi")], &GenerationOptions::default())
            .await
            .unwrap()
            .map(|f| f.unwrap())
            .collect()
            .await;

        assert_eq!(fragments.concat(), "Hello.");
    }

    #[tokio::test]
    async fn test_stream_error_object_surfaces() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/chat")
            .with_status(200)
            .with_body("{\"error\":\"model crashed\"}\n")
            .create_async()
            .await;

        let adapter = OllamaAdapter::new(server.url(), "llama3.2");
        let results: Vec<Result<String, LLMError>> = adapter
            .generate_stream(&[ChatMessage::user("hi")], &GenerationOptions::default())
            .await
            .unwrap()
            .collect()
            .await;

        assert!(matches!(results.as_slice(), [Err(LLMError::Provider(m))] if m == "model crashed"));
    }

    #[tokio::test]
    async fn test_missing_model() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/api/chat").with_status(404).create_async().await;

        let adapter = OllamaAdapter::new(server.url(), "nope");
        let err = adapter
            .generate(&[ChatMessage::user("hi")], &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::ModelNotFound(m) if m == "nope"));
    }
}
