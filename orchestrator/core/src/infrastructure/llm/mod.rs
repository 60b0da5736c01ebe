// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each provider adapter translates between the domain `LLMProvider` seam
// and an external chat API, including its streaming dialect.

pub mod openai;
pub mod ollama;
pub mod registry;

pub use ollama::OllamaAdapter;
pub use openai::OpenAIAdapter;
pub use registry::ProviderRegistry;

use futures::stream::{Stream, StreamExt};

use crate::domain::llm::LLMError;

/// Split a streamed HTTP body into complete, non-empty lines.
///
/// Chunks may end mid-line; the remainder is carried into the next chunk and
/// flushed once the body ends.
pub(crate) fn body_lines(response: reqwest::Response) -> impl Stream<Item = Result<String, LLMError>> + Send {
    async_stream::try_stream! {
        let mut bytes = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| LLMError::Network(e.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer.drain(..=line_end);
                if !line.is_empty() {
                    yield line;
                }
            }
        }

        let rest = buffer.trim();
        if !rest.is_empty() {
            yield rest.to_string();
        }
    }
}

/// Map a non-success response to the domain error, consuming the body.
pub(crate) async fn error_for_status(response: reqwest::Response, model: &str) -> LLMError {
    let status = response.status().as_u16();
    let error_text = response.text().await.unwrap_or_default();
    LLMError::from_status(status, error_text, model)
}
