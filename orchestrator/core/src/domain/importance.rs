// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Importance scoring for statements that may become memories.

use regex::Regex;
use std::sync::LazyLock;

use super::consultation::Speaker;

pub trait ImportanceScorer: Send + Sync {
    /// Importance of one statement in `[0, 1]`.
    fn score(&self, text: &str, speaker: Speaker) -> f64;
}

static RE_FINANCIAL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(pension|annuit\w*|drawdown|lump sum|tax\w*|savings|debt|mortgage|income|retire\w*|invest\w*|fees?|charges?)\b|£\d+|\d+%").ok()
});
static RE_PERSONAL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(i am|i'm|my|we|our|family|partner|health|worried|afraid|need|want|goal)\b").ok()
});

/// Keyword and length heuristic.
///
/// Starts from a small base and adds weight for financial vocabulary,
/// personal disclosure, questions and length. Advisor statements start
/// lower since most of what an advisor says is generic.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicImportanceScorer;

impl ImportanceScorer for HeuristicImportanceScorer {
    fn score(&self, text: &str, speaker: Speaker) -> f64 {
        let text = text.trim();
        if text.is_empty() {
            return 0.0;
        }

        let count = |re: &LazyLock<Option<Regex>>| re.as_ref().map(|r| r.find_iter(text).count()).unwrap_or(0);

        let mut score = match speaker {
            Speaker::Customer => 0.15,
            Speaker::Advisor => 0.1,
        };
        score += (count(&RE_FINANCIAL) as f64 * 0.12).min(0.36);
        score += (count(&RE_PERSONAL) as f64 * 0.06).min(0.24);
        if text.contains('?') {
            score += 0.05;
        }
        let words = text.split_whitespace().count() as f64;
        score += (words / 200.0).min(0.15);

        score.clamp(0.0, 1.0)
    }
}
