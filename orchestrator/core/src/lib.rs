// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `counsel-core` - Guidance Orchestration
//!
//! Answers customer questions with compliance-checked guidance and learns
//! from how consultations end.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | consultations, verdicts, learning values, LLM and prompt seams, config |
//! | [`application`] | Application | orchestration engine, compliance validator, learning loop, [`AdvisorService`] |
//! | [`infrastructure`] | Infrastructure | LLM adapters and registry, prompt templates, event bus |
//!
//! Knowledge storage and retrieval live in `counsel-cortex`.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use application::AdvisorService;
pub use domain::config::CounselConfig;
pub use domain::consultation::{ConsultationId, CustomerProfile, GuidanceRequest};
pub use domain::error::GuidanceError;
pub use domain::learning::{ConsultationOutcome, LearningReport};
