// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::record::ScoredRecord;
use super::scoring::clamp_unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CaseId(pub Uuid);

impl CaseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Structured result of a finished consultation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub success: bool,
    pub satisfaction: f64,
    pub comprehension: f64,
    pub goal_alignment: f64,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl CaseOutcome {
    pub fn new(success: bool, satisfaction: f64, comprehension: f64, goal_alignment: f64) -> Self {
        Self {
            success,
            satisfaction: clamp_unit(satisfaction),
            comprehension: clamp_unit(comprehension),
            goal_alignment: clamp_unit(goal_alignment),
            issues: Vec::new(),
        }
    }

    pub fn with_issues(mut self, issues: Vec<String>) -> Self {
        self.issues = issues;
        self
    }

    /// Mean of the three normalised scores.
    pub fn quality_score(&self) -> f64 {
        clamp_unit(
            (clamp_unit(self.satisfaction)
                + clamp_unit(self.comprehension)
                + clamp_unit(self.goal_alignment))
                / 3.0,
        )
    }
}

/// Conversational technique examples lifted from a high-quality consultation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogueTechniques {
    #[serde(default)]
    pub signposting: Vec<String>,
    #[serde(default)]
    pub engagement: Vec<String>,
    #[serde(default)]
    pub personalization: Vec<String>,
}

impl DialogueTechniques {
    pub fn is_empty(&self) -> bool {
        self.signposting.is_empty() && self.engagement.is_empty() && self.personalization.is_empty()
    }
}

/// A stored precedent. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub task_type: String,
    pub situation_summary: String,
    pub guidance_text: String,
    pub outcome: CaseOutcome,
    pub embedding: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue_techniques: Option<DialogueTechniques>,
    pub created_at: DateTime<Utc>,
}

impl Case {
    pub fn new(
        task_type: impl Into<String>,
        situation_summary: impl Into<String>,
        guidance_text: impl Into<String>,
        outcome: CaseOutcome,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: CaseId::new(),
            task_type: task_type.into(),
            situation_summary: situation_summary.into(),
            guidance_text: guidance_text.into(),
            outcome,
            embedding,
            dialogue_techniques: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_dialogue_techniques(mut self, techniques: DialogueTechniques) -> Self {
        self.dialogue_techniques = Some(techniques);
        self
    }
}

impl ScoredRecord for Case {
    type Id = CaseId;
    const KIND: &'static str = "case";

    fn id(&self) -> CaseId {
        self.id
    }

    fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Cases carry no importance of their own; the outcome quality stands in.
    fn importance(&self) -> f64 {
        self.outcome.quality_score()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_score_is_mean() {
        let outcome = CaseOutcome::new(true, 0.9, 0.6, 0.6);
        assert!((outcome.quality_score() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_outcome_scores_are_clamped() {
        let outcome = CaseOutcome::new(true, 3.0, -1.0, 0.5);
        assert_eq!(outcome.satisfaction, 1.0);
        assert_eq!(outcome.comprehension, 0.0);
        assert!((outcome.quality_score() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_case_importance_tracks_outcome() {
        let case = Case::new(
            "pension_consolidation",
            "Customer with three small pensions",
            "Here are the options...",
            CaseOutcome::new(true, 1.0, 1.0, 1.0),
            vec![1.0, 0.0],
        );
        assert_eq!(case.importance(), 1.0);
        assert!(case.dialogue_techniques.is_none());
    }
}
