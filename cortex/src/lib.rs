// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `counsel-cortex` - Scored Retrieval for Memories, Cases and Rules
//!
//! The knowledge layer of the guidance core. Three record kinds share one
//! ranking engine:
//!
//! | Record | Store | Importance source |
//! |--------|-------|-------------------|
//! | [`MemoryItem`] | [`MemoryStore`] | stored `importance`, fixed at creation |
//! | [`Case`] | [`CaseStore`] | outcome quality score |
//! | [`Rule`] | [`RuleStore`] | current rule `confidence` |
//!
//! Every retrieval ranks candidates by
//! `w_r * recency + w_i * importance + w_v * relevance`, where relevance is
//! cosine similarity mapped to `[0, 1]` and recency decays exponentially from
//! the record's last access (24h half-life by default).
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | records, scoring maths, cortex events |
//! | [`application`] | Application | [`ScoredStore`], [`KnowledgeBase`] |
//! | [`infrastructure`] | Infrastructure | vector index, persistence and embedding seams |

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod error;

pub use domain::*;
pub use application::*;
pub use infrastructure::*;
pub use error::{CortexError, EmbeddingError};
