// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Embedding Client
//!
//! Produces the fixed-length vectors every record and query is indexed by.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** `Embed(text) -> vector` seam plus two implementations:
//!   a deterministic feature-hashing embedder (tests, offline use) and an
//!   HTTP client for OpenAI-compatible or Ollama embedding endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::EmbeddingError;

/// Embedding capability consumed by the stores and the orchestration layer
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn dimensions(&self) -> usize;
}

/// Bag-of-words feature hashing into a fixed number of buckets, L2-normalised.
/// Texts sharing vocabulary land close together, which is enough for tests
/// and for running without an embedding service.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub const DEFAULT_DIMENSIONS: usize = 384;

    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let hash = hasher.finish();
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Wire dialect of an embedding endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingApi {
    /// `POST {endpoint}/embeddings` with `{model, input}`
    OpenaiCompatible,
    /// `POST {endpoint}/api/embeddings` with `{model, prompt}`
    Ollama,
}

pub struct HttpEmbedder {
    client: reqwest::Client,
    api: EmbeddingApi,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct OpenAIEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(
        api: EmbeddingApi,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api,
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
            dimensions,
        }
    }

    async fn send<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response, EmbeddingError> {
        let url = format!("{}{}", self.endpoint.trim_end_matches('/'), path);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmbeddingError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Provider(format!("HTTP {}: {}", status, error_text)));
        }
        Ok(response)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let embedding = match self.api {
            EmbeddingApi::OpenaiCompatible => {
                let body = OpenAIEmbeddingRequest {
                    model: &self.model,
                    input: text,
                };
                let parsed: OpenAIEmbeddingResponse = self
                    .send("/embeddings", &body)
                    .await?
                    .json()
                    .await
                    .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;
                parsed
                    .data
                    .into_iter()
                    .next()
                    .map(|d| d.embedding)
                    .ok_or_else(|| EmbeddingError::Malformed("empty data array".into()))?
            }
            EmbeddingApi::Ollama => {
                let body = OllamaEmbeddingRequest {
                    model: &self.model,
                    prompt: text,
                };
                let parsed: OllamaEmbeddingResponse = self
                    .send("/api/embeddings", &body)
                    .await?
                    .json()
                    .await
                    .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;
                parsed.embedding
            }
        };

        if embedding.len() != self.dimensions {
            return Err(EmbeddingError::Malformed(format!(
                "expected {} dimensions, got {}",
                self.dimensions,
                embedding.len()
            )));
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
