// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod generation;
pub mod compliance_validator;
pub mod context_retriever;
pub mod ledger;
pub mod validation_pool;
pub mod memory_recorder;
pub mod orchestration;
pub mod learning_loop;
pub mod advisor_service;

// Re-export the service surface for convenience
pub use advisor_service::AdvisorService;
pub use compliance_validator::ComplianceValidator;
pub use context_retriever::{ContextRetriever, RetrievalSettings};
pub use generation::Generator;
pub use learning_loop::LearningLoop;
pub use ledger::{ConsultationLedger, ConsultationRecord, TurnGuard};
pub use memory_recorder::MemoryRecorder;
pub use orchestration::{EngineSettings, GuidanceReply, GuidanceStream, OrchestrationEngine};
pub use validation_pool::ValidationPool;
