// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Compliance
//!
//! Verdicts produced by the compliance rubric and the route each one sends
//! a guidance turn down.
//!
//! # Verdict derivation
//!
//! - `passed` is true when no criterion hard-fails.
//! - `requires_human_review` is true when the verdict failed, or passed with
//!   a confidence below the borderline threshold (0.70 by default).
//! - A pass with confidence in `[borderline, pass)` (0.70 to 0.85 by
//!   default) is *borderline*: it returns unchanged but is flagged.
//!
//! | passed | review | route |
//! |--------|--------|-------|
//! | true | false | [`Route::Return`] |
//! | false | true | [`Route::Refine`] |
//! | true | true | [`Route::Strengthen`] |

use serde::{Deserialize, Serialize};

use super::parsing::{parse_json, unit_score, ParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    AdviceBoundary,
    RiskDisclosure,
    Clarity,
    UnderstandingCheck,
    Signposting,
}

impl Criterion {
    pub const ALL: [Criterion; 5] = [
        Criterion::AdviceBoundary,
        Criterion::RiskDisclosure,
        Criterion::Clarity,
        Criterion::UnderstandingCheck,
        Criterion::Signposting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::AdviceBoundary => "advice_boundary",
            Criterion::RiskDisclosure => "risk_disclosure",
            Criterion::Clarity => "clarity",
            Criterion::UnderstandingCheck => "understanding_check",
            Criterion::Signposting => "signposting",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionResult {
    pub criterion: Criterion,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplianceThresholds {
    /// At or above this a passing verdict needs no attention at all
    pub pass: f64,
    /// Below this a passing verdict requires human review
    pub borderline: f64,
}

impl Default for ComplianceThresholds {
    fn default() -> Self {
        Self {
            pass: 0.85,
            borderline: 0.70,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Return,
    Refine,
    Strengthen,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Return => "return",
            Route::Refine => "refine",
            Route::Strengthen => "strengthen",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub confidence: f64,
    pub issues: Vec<String>,
    pub requires_human_review: bool,
    pub criteria: Vec<CriterionResult>,
}

impl Verdict {
    /// Derive the verdict flags from per-criterion results.
    pub fn derive(
        criteria: Vec<CriterionResult>,
        confidence: f64,
        issues: Vec<String>,
        thresholds: &ComplianceThresholds,
    ) -> Self {
        let passed = criteria.iter().all(|c| c.passed);
        let requires_human_review = !passed || confidence < thresholds.borderline;
        Self {
            passed,
            confidence,
            issues,
            requires_human_review,
            criteria,
        }
    }

    pub fn route(&self) -> Route {
        match (self.passed, self.requires_human_review) {
            (true, false) => Route::Return,
            (false, _) => Route::Refine,
            (true, true) => Route::Strengthen,
        }
    }

    /// Passed without review but below the no-attention threshold.
    pub fn is_borderline(&self, thresholds: &ComplianceThresholds) -> bool {
        self.passed && !self.requires_human_review && self.confidence < thresholds.pass
    }

    pub fn failed_criteria(&self) -> impl Iterator<Item = Criterion> + '_ {
        self.criteria.iter().filter(|c| !c.passed).map(|c| c.criterion)
    }
}

#[derive(Debug, Deserialize)]
struct RawCriterion {
    passed: bool,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCriteria {
    advice_boundary: RawCriterion,
    risk_disclosure: RawCriterion,
    clarity: RawCriterion,
    understanding_check: RawCriterion,
    signposting: RawCriterion,
}

#[derive(Debug, Deserialize)]
struct RawAssessment {
    criteria: RawCriteria,
    confidence: f64,
    issues: Vec<String>,
}

/// Parse a rubric response into a [`Verdict`].
///
/// Every criterion, `confidence` and `issues` must be present. The note of
/// each failed criterion is appended to the issue list when the model did
/// not already list it.
pub fn parse_verdict(text: &str, thresholds: &ComplianceThresholds) -> Result<Verdict, ParseError> {
    let raw: RawAssessment = parse_json(text)?;
    let confidence = unit_score("confidence", raw.confidence)?;

    let RawCriteria {
        advice_boundary,
        risk_disclosure,
        clarity,
        understanding_check,
        signposting,
    } = raw.criteria;
    let criteria: Vec<CriterionResult> = [
        (Criterion::AdviceBoundary, advice_boundary),
        (Criterion::RiskDisclosure, risk_disclosure),
        (Criterion::Clarity, clarity),
        (Criterion::UnderstandingCheck, understanding_check),
        (Criterion::Signposting, signposting),
    ]
    .into_iter()
    .map(|(criterion, raw)| CriterionResult {
        criterion,
        passed: raw.passed,
        note: raw.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
    })
    .collect();

    let mut issues: Vec<String> = raw
        .issues
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect();
    for failed in criteria.iter().filter(|c| !c.passed) {
        let issue = match &failed.note {
            Some(note) => format!("{}: {}", failed.criterion.as_str(), note),
            None => format!("{}: failed", failed.criterion.as_str()),
        };
        if !issues.iter().any(|i| i.starts_with(failed.criterion.as_str())) {
            issues.push(issue);
        }
    }

    Ok(Verdict::derive(criteria, confidence, issues, thresholds))
}
