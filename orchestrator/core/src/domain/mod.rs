// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer of the guidance core: consultations, verdicts, learning
//! values, the LLM and prompt seams, and configuration.

pub mod config;
pub mod consultation;
pub mod compliance;
pub mod context;
pub mod error;
pub mod events;
pub mod importance;
pub mod learning;
pub mod llm;
pub mod parsing;
pub mod prompt;
pub mod signals;
