// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application layer for Cortex bounded context

pub mod scored_store;
pub mod knowledge_base;

pub use scored_store::{rank, Scored, ScoredStore};
pub use knowledge_base::{CaseStore, KnowledgeBase, MemoryStore, RuleStore};
