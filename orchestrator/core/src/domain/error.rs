// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Errors surfaced by the guidance core.
//!
//! A compliance failure and a learning-gate rejection are ordinary results
//! ([`super::compliance::Verdict`], [`super::learning::LearningReport`]) and
//! never appear here. Everything below means the pipeline could not proceed.

use thiserror::Error;

use counsel_cortex::{CortexError, EmbeddingError};

use super::consultation::ConsultationId;
use super::llm::LLMError;
use super::parsing::ParseError;

#[derive(Debug, Error)]
pub enum GuidanceError {
    #[error("Generation failed during {purpose}: {source}")]
    Generation {
        purpose: &'static str,
        #[source]
        source: LLMError,
    },

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Storage failed: {0}")]
    Storage(#[from] CortexError),

    #[error("Malformed {purpose} response: {source}")]
    MalformedResponse {
        purpose: &'static str,
        #[source]
        source: ParseError,
    },

    #[error("Prompt rendering failed: {0}")]
    Prompt(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Unknown consultation: {0}")]
    UnknownConsultation(ConsultationId),
}

impl GuidanceError {
    /// Infrastructure failures are worth retrying as a whole turn.
    /// Cancellation and unknown consultations are not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GuidanceError::Cancelled | GuidanceError::UnknownConsultation(_))
    }
}
