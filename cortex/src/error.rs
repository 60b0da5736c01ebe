// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Error types for the Cortex bounded context

use thiserror::Error;

/// Errors raised by the stores and the vector index
#[derive(Debug, Error)]
pub enum CortexError {
    #[error("{store} record not found: {id}")]
    NotFound { store: &'static str, id: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding must not be empty")]
    EmptyEmbedding,

    #[error("Persistence failed: {0}")]
    Persistence(String),
}

/// Errors raised by an [`crate::Embedder`]
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding provider error: {0}")]
    Provider(String),

    #[error("Malformed embedding response: {0}")]
    Malformed(String),
}
