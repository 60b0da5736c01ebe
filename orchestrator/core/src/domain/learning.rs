// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Learning
//!
//! Outcome types and gate responses for the outcome-driven learning loop.
//!
//! A successful consultation becomes a stored case. A failed one goes
//! through four generation stages (reflect, validate the principle, refine
//! it, judge its value) and only becomes a rule when every stage passes.
//! Rejections at the gate are expected results, not errors.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use counsel_cortex::{CaseId, CaseOutcome, DialogueTechniques, RuleId};

use super::parsing::{non_empty, parse_json, unit_score, ParseError};

/// How a consultation ended, as reported by the surrounding application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationOutcome {
    pub successful: bool,
    pub satisfaction: f64,
    pub comprehension: f64,
    pub goal_alignment: f64,
    /// Quality of the dialogue itself; gates technique extraction
    #[serde(default)]
    pub conversational_quality: f64,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl ConsultationOutcome {
    pub fn to_case_outcome(&self) -> CaseOutcome {
        CaseOutcome::new(self.successful, self.satisfaction, self.comprehension, self.goal_alignment)
            .with_issues(self.issues.clone())
    }

    /// Mean of the three normalised outcome scores.
    pub fn quality_score(&self) -> f64 {
        self.to_case_outcome().quality_score()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningStage {
    Reflect,
    ValidatePrinciple,
    Refine,
    JudgeValue,
}

impl LearningStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LearningStage::Reflect => "reflect",
            LearningStage::ValidatePrinciple => "validate_principle",
            LearningStage::Refine => "refine",
            LearningStage::JudgeValue => "judge_value",
        }
    }
}

/// Confidence change applied to one cited rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRecalibration {
    pub rule_id: RuleId,
    pub old_confidence: f64,
    pub new_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LearningReport {
    CaseStored {
        case_id: CaseId,
        recalibrated: Vec<RuleRecalibration>,
    },
    RuleCreated {
        rule_id: RuleId,
        recalibrated: Vec<RuleRecalibration>,
    },
    RuleRejected {
        stage: LearningStage,
        reason: String,
        recalibrated: Vec<RuleRecalibration>,
    },
}

impl LearningReport {
    pub fn recalibrated(&self) -> &[RuleRecalibration] {
        match self {
            LearningReport::CaseStored { recalibrated, .. }
            | LearningReport::RuleCreated { recalibrated, .. }
            | LearningReport::RuleRejected { recalibrated, .. } => recalibrated,
        }
    }
}

/// The lesson a consultation has already committed to the knowledge base
#[derive(Debug, Clone, PartialEq)]
pub enum LearnedLesson {
    CaseStored(CaseId),
    RuleCreated(RuleId),
    RuleRejected { stage: LearningStage, reason: String },
}

impl LearnedLesson {
    pub fn into_report(self, recalibrated: Vec<RuleRecalibration>) -> LearningReport {
        match self {
            LearnedLesson::CaseStored(case_id) => LearningReport::CaseStored { case_id, recalibrated },
            LearnedLesson::RuleCreated(rule_id) => LearningReport::RuleCreated { rule_id, recalibrated },
            LearnedLesson::RuleRejected { stage, reason } => LearningReport::RuleRejected {
                stage,
                reason,
                recalibrated,
            },
        }
    }
}

/// Learning work already applied for one consultation. An attempt that
/// fails part-way leaves this behind so the next attempt resumes after the
/// last committed write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LearningProgress {
    pub lesson: Option<LearnedLesson>,
    pub recalibrated: Vec<RuleRecalibration>,
}

impl LearningProgress {
    pub fn recalibration_of(&self, rule_id: RuleId) -> Option<&RuleRecalibration> {
        self.recalibrated.iter().find(|r| r.rule_id == rule_id)
    }
}

/// Reflect stage: a candidate principle drawn from a failed consultation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipleProposal {
    pub principle: String,
    pub domain: String,
}

/// ValidatePrinciple stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipleValidation {
    pub valid: bool,
    pub confidence: f64,
    pub reason: String,
}

/// JudgeValue stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueJudgement {
    pub worth_keeping: bool,
    pub reason: String,
}

pub fn parse_proposal(text: &str) -> Result<PrincipleProposal, ParseError> {
    let raw: PrincipleProposal = parse_json(text)?;
    Ok(PrincipleProposal {
        principle: non_empty("principle", &raw.principle)?,
        domain: non_empty("domain", &raw.domain)?,
    })
}

pub fn parse_principle_validation(text: &str) -> Result<PrincipleValidation, ParseError> {
    let raw: PrincipleValidation = parse_json(text)?;
    Ok(PrincipleValidation {
        valid: raw.valid,
        confidence: unit_score("confidence", raw.confidence)?,
        reason: raw.reason.trim().to_string(),
    })
}

pub fn parse_refined_principle(text: &str) -> Result<String, ParseError> {
    #[derive(Deserialize)]
    struct Refined {
        principle: String,
    }
    let raw: Refined = parse_json(text)?;
    non_empty("principle", &raw.principle)
}

pub fn parse_value_judgement(text: &str) -> Result<ValueJudgement, ParseError> {
    let raw: ValueJudgement = parse_json(text)?;
    Ok(ValueJudgement {
        worth_keeping: raw.worth_keeping,
        reason: raw.reason.trim().to_string(),
    })
}

/// Situation summaries are free text; only emptiness is rejected.
pub fn parse_summary(text: &str) -> Result<String, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(trimmed.to_string())
}

static RE_SIGNPOSTING: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(pension wise|moneyhelper|citizens advice|regulated (financial )?advis[eo]r|independent financial advis[eo]r|speak to an? (financial )?advis[eo]r|free guidance service)\b").ok()
});
static RE_ENGAGEMENT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(does that make sense|how do you feel|what matters most|would you like|is there anything)").ok()
});
static RE_PERSONALIZATION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(you mentioned|you said|in your (situation|case)|given your|for you specifically)\b").ok()
});

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive(['.', '?', '!', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Pick out example sentences of signposting, engagement and
/// personalisation from the advisor's turns.
pub fn extract_dialogue_techniques(advisor_turns: &[&str]) -> DialogueTechniques {
    let mut techniques = DialogueTechniques::default();
    for turn in advisor_turns {
        for sentence in sentences(turn) {
            let matches = |re: &LazyLock<Option<Regex>>| re.as_ref().is_some_and(|r| r.is_match(sentence));
            let bucket = if matches(&RE_SIGNPOSTING) {
                &mut techniques.signposting
            } else if matches(&RE_PERSONALIZATION) {
                &mut techniques.personalization
            } else if matches(&RE_ENGAGEMENT) {
                &mut techniques.engagement
            } else {
                continue;
            };
            if !bucket.iter().any(|s| s == sentence) {
                bucket.push(sentence.to_string());
            }
        }
    }
    techniques
}
