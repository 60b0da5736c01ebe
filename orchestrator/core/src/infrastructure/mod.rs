// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure layer: LLM adapters, prompt templates and the event bus.

pub mod event_bus;
pub mod llm;
pub mod prompt_template_engine;

pub use event_bus::{DomainEvent, EventBus, EventBusError, EventReceiver};
pub use prompt_template_engine::{PromptTemplate, TemplatePromptBuilder};
