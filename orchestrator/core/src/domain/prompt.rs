// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Prompt
//!
//! Seam between the pipeline and prompt construction. The pipeline says
//! *what* it needs generated through a [`PromptRequest`]; a
//! [`PromptBuilder`] turns that into chat messages.

use thiserror::Error;

use super::compliance::Verdict;
use super::consultation::{CustomerProfile, Turn};
use super::context::RetrievedContext;
use super::learning::{ConsultationOutcome, PrincipleProposal};
use super::llm::ChatMessage;
use super::signals::ConversationSignals;

/// Label of every generation call the core makes. Used for metrics and
/// error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationPurpose {
    Reasoning,
    Guidance,
    Refine,
    Strengthen,
    Compliance,
    SituationSummary,
    Reflect,
    ValidatePrinciple,
    RefinePrinciple,
    JudgeValue,
}

impl GenerationPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationPurpose::Reasoning => "reasoning",
            GenerationPurpose::Guidance => "guidance",
            GenerationPurpose::Refine => "refine",
            GenerationPurpose::Strengthen => "strengthen",
            GenerationPurpose::Compliance => "compliance",
            GenerationPurpose::SituationSummary => "situation_summary",
            GenerationPurpose::Reflect => "reflect",
            GenerationPurpose::ValidatePrinciple => "validate_principle",
            GenerationPurpose::RefinePrinciple => "refine_principle",
            GenerationPurpose::JudgeValue => "judge_value",
        }
    }
}

/// Everything known about the turn being answered
#[derive(Debug, Clone, Copy)]
pub struct TurnFrame<'a> {
    pub customer: &'a CustomerProfile,
    pub task_type: &'a str,
    pub question: &'a str,
    /// Transcript before this turn
    pub history: &'a [Turn],
    pub context: &'a RetrievedContext,
    pub signals: ConversationSignals,
    /// Issues from a failed post-stream validation of the previous turn
    pub carried_issues: &'a [String],
}

#[derive(Debug, Clone, Copy)]
pub enum PromptRequest<'a> {
    Reasoning {
        frame: &'a TurnFrame<'a>,
    },
    Guidance {
        frame: &'a TurnFrame<'a>,
        reasoning: Option<&'a str>,
    },
    Refine {
        frame: &'a TurnFrame<'a>,
        draft: &'a str,
        issues: &'a [String],
    },
    Strengthen {
        frame: &'a TurnFrame<'a>,
        draft: &'a str,
        verdict: &'a Verdict,
    },
    Compliance {
        guidance: &'a str,
        customer: &'a CustomerProfile,
        reasoning: Option<&'a str>,
    },
    SituationSummary {
        task_type: &'a str,
        customer: &'a CustomerProfile,
        transcript: &'a [Turn],
    },
    Reflect {
        task_type: &'a str,
        transcript: &'a [Turn],
        outcome: &'a ConsultationOutcome,
    },
    ValidatePrinciple {
        proposal: &'a PrincipleProposal,
    },
    RefinePrinciple {
        proposal: &'a PrincipleProposal,
        transcript: &'a [Turn],
    },
    JudgeValue {
        principle: &'a str,
        domain: &'a str,
    },
}

impl PromptRequest<'_> {
    pub fn purpose(&self) -> GenerationPurpose {
        match self {
            PromptRequest::Reasoning { .. } => GenerationPurpose::Reasoning,
            PromptRequest::Guidance { .. } => GenerationPurpose::Guidance,
            PromptRequest::Refine { .. } => GenerationPurpose::Refine,
            PromptRequest::Strengthen { .. } => GenerationPurpose::Strengthen,
            PromptRequest::Compliance { .. } => GenerationPurpose::Compliance,
            PromptRequest::SituationSummary { .. } => GenerationPurpose::SituationSummary,
            PromptRequest::Reflect { .. } => GenerationPurpose::Reflect,
            PromptRequest::ValidatePrinciple { .. } => GenerationPurpose::ValidatePrinciple,
            PromptRequest::RefinePrinciple { .. } => GenerationPurpose::RefinePrinciple,
            PromptRequest::JudgeValue { .. } => GenerationPurpose::JudgeValue,
        }
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct PromptError(pub String);

pub trait PromptBuilder: Send + Sync {
    fn build(&self, request: &PromptRequest<'_>) -> Result<Vec<ChatMessage>, PromptError>;
}
