// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Learned rules and their confidence recalibration.
//!
//! A rule is never deleted. Every outcome of a consultation that cited the
//! rule moves its confidence:
//!
//! - success: `confidence += η * quality * (1 - confidence)`
//! - failure: `confidence -= η * (1 - quality) * confidence`
//!
//! The result is clamped to `[0, 1]`. `success_rate` is derived from the
//! performance counters and is not the same thing as confidence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::record::ScoredRecord;
use super::scoring::clamp_unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleId(pub Uuid);

impl RuleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulePerformance {
    pub uses: u64,
    pub successes: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub principle: String,
    pub domain: String,
    confidence: f64,
    #[serde(default)]
    pub supporting_evidence: Vec<String>,
    #[serde(default)]
    pub performance: RulePerformance,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// Confidence before and after one recalibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceChange {
    pub old: f64,
    pub new: f64,
}

impl Rule {
    pub fn new(
        principle: impl Into<String>,
        domain: impl Into<String>,
        confidence: f64,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: RuleId::new(),
            principle: principle.into(),
            domain: domain.into(),
            confidence: clamp_unit(confidence),
            supporting_evidence: Vec::new(),
            performance: RulePerformance::default(),
            embedding,
            created_at: Utc::now(),
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.supporting_evidence.push(evidence.into());
        self
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Fold one tracked outcome into the rule.
    pub fn record_outcome(&mut self, success: bool, quality: f64, learning_rate: f64) -> ConfidenceChange {
        let quality = clamp_unit(quality);
        let eta = clamp_unit(learning_rate);
        let old = self.confidence;

        self.performance.uses += 1;
        let updated = if success {
            self.performance.successes += 1;
            old + eta * quality * (1.0 - old)
        } else {
            self.performance.failures += 1;
            old - eta * (1.0 - quality) * old
        };
        self.confidence = clamp_unit(updated);

        ConfidenceChange {
            old,
            new: self.confidence,
        }
    }

    /// `successes / uses`, or `0` for an unused rule.
    pub fn success_rate(&self) -> f64 {
        if self.performance.uses == 0 {
            0.0
        } else {
            self.performance.successes as f64 / self.performance.uses as f64
        }
    }
}

impl ScoredRecord for Rule {
    type Id = RuleId;
    const KIND: &'static str = "rule";

    fn id(&self) -> RuleId {
        self.id
    }

    fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn importance(&self) -> f64 {
        self.confidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(confidence: f64) -> Rule {
        Rule::new("Check understanding before moving on", "clarity", confidence, vec![1.0])
    }

    #[test]
    fn test_success_moves_toward_one() {
        let mut r = rule(0.5);
        let change = r.record_outcome(true, 1.0, 0.1);
        assert_eq!(change.old, 0.5);
        assert!((change.new - 0.55).abs() < 1e-9);
        assert_eq!(r.performance, RulePerformance { uses: 1, successes: 1, failures: 0 });
    }

    #[test]
    fn test_failure_moves_toward_zero() {
        let mut r = rule(0.5);
        let change = r.record_outcome(false, 0.0, 0.1);
        assert!((change.new - 0.45).abs() < 1e-9);
        assert_eq!(r.performance, RulePerformance { uses: 1, successes: 0, failures: 1 });
    }

    #[test]
    fn test_perfect_failure_quality_leaves_confidence() {
        let mut r = rule(0.6);
        r.record_outcome(false, 1.0, 0.1);
        assert!((r.confidence() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_stays_in_unit_interval() {
        for &prior in &[0.0, 0.3, 1.0] {
            for &quality in &[0.0, 1.0] {
                for &success in &[true, false] {
                    let mut r = rule(prior);
                    r.record_outcome(success, quality, 1.0);
                    assert!((0.0..=1.0).contains(&r.confidence()));
                }
            }
        }
    }

    #[test]
    fn test_success_rate() {
        let mut r = rule(0.5);
        assert_eq!(r.success_rate(), 0.0);
        r.record_outcome(true, 0.8, 0.1);
        r.record_outcome(false, 0.2, 0.1);
        r.record_outcome(true, 0.9, 0.1);
        assert!((r.success_rate() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(r.performance.uses, 3);
    }

    #[test]
    fn test_importance_is_confidence() {
        let r = rule(0.42);
        assert_eq!(ScoredRecord::importance(&r), 0.42);
    }
}
