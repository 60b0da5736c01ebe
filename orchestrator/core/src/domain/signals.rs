// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Conversation signals: phase and emotional state.
//!
//! Both are informational context for prompt construction. They never change
//! which route a turn takes. The default classifier is a keyword heuristic;
//! anything implementing [`SignalClassifier`] can replace it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    Opening,
    Middle,
    Closing,
}

/// Ordered by tie-break priority: when two states score equally the
/// earlier variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalState {
    Frustrated,
    Anxious,
    Confused,
    Confident,
    Neutral,
}

impl ConversationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationPhase::Opening => "opening",
            ConversationPhase::Middle => "middle",
            ConversationPhase::Closing => "closing",
        }
    }
}

impl EmotionalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionalState::Frustrated => "frustrated",
            EmotionalState::Anxious => "anxious",
            EmotionalState::Confused => "confused",
            EmotionalState::Confident => "confident",
            EmotionalState::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSignals {
    pub phase: ConversationPhase,
    pub emotion: EmotionalState,
}

pub trait SignalClassifier: Send + Sync {
    /// `customer_turns` holds every customer message of the consultation,
    /// oldest first, including the one being answered.
    fn classify(&self, customer_turns: &[&str]) -> ConversationSignals;
}

pub struct KeywordSignalClassifier {
    opening_turns: usize,
}

impl KeywordSignalClassifier {
    pub fn new(opening_turns: usize) -> Self {
        Self { opening_turns }
    }
}

impl Default for KeywordSignalClassifier {
    fn default() -> Self {
        Self::new(2)
    }
}

impl SignalClassifier for KeywordSignalClassifier {
    fn classify(&self, customer_turns: &[&str]) -> ConversationSignals {
        ConversationSignals {
            phase: detect_phase(customer_turns, self.opening_turns),
            emotion: detect_emotion(customer_turns),
        }
    }
}

macro_rules! keyword_pattern {
    ($name:ident, $regex_str:expr) => {
        static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($regex_str).ok());
    };
}

keyword_pattern!(
    RE_CLOSING,
    r"(?i)\b(thank you|thanks|goodbye|bye|that's all|that is all|that's everything|no more questions)\b"
);
keyword_pattern!(
    RE_FRUSTRATED,
    r"(?i)\b(frustrat\w*|annoy\w*|fed up|ridiculous|waste of time|angry|already told you|useless|pointless)\b"
);
keyword_pattern!(
    RE_ANXIOUS,
    r"(?i)\b(worr\w*|anxious|nervous|scared|afraid|concerned|panic\w*|stress\w*|uneasy)\b"
);
keyword_pattern!(
    RE_CONFUSED,
    r"(?i)\b(confus\w*|don't understand|do not understand|unclear|what do you mean|what does that mean|lost|complicated)\b"
);
keyword_pattern!(
    RE_CONFIDENT,
    r"(?i)\b(confident|makes sense|that's clear|i understand|ready to|comfortable|reassured|great)\b"
);

fn hits(pattern: &LazyLock<Option<Regex>>, text: &str) -> usize {
    pattern
        .as_ref()
        .map(|re| re.find_iter(text).count())
        .unwrap_or(0)
}

/// Closing if the latest customer turn says goodbye, opening while the
/// customer has spoken at most `opening_turns` times, middle otherwise.
pub fn detect_phase(customer_turns: &[&str], opening_turns: usize) -> ConversationPhase {
    if let Some(latest) = customer_turns.last() {
        if hits(&RE_CLOSING, latest) > 0 {
            return ConversationPhase::Closing;
        }
    }
    if customer_turns.len() <= opening_turns {
        ConversationPhase::Opening
    } else {
        ConversationPhase::Middle
    }
}

fn strongest(text: &str) -> Option<EmotionalState> {
    let scores = [
        (EmotionalState::Frustrated, hits(&RE_FRUSTRATED, text)),
        (EmotionalState::Anxious, hits(&RE_ANXIOUS, text)),
        (EmotionalState::Confused, hits(&RE_CONFUSED, text)),
        (EmotionalState::Confident, hits(&RE_CONFIDENT, text)),
    ];
    let mut best: Option<(EmotionalState, usize)> = None;
    for (state, count) in scores {
        if count > 0 && best.map_or(true, |(_, top)| count > top) {
            best = Some((state, count));
        }
    }
    best.map(|(state, _)| state)
}

/// The latest customer turn decides when it carries any emotional keyword,
/// so a change of mood is picked up immediately. Otherwise keyword hits are
/// counted over every customer turn.
pub fn detect_emotion(customer_turns: &[&str]) -> EmotionalState {
    if let Some(state) = customer_turns.last().and_then(|latest| strongest(latest)) {
        return state;
    }
    strongest(&customer_turns.join("\n")).unwrap_or(EmotionalState::Neutral)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_by_turn_count() {
        assert_eq!(detect_phase(&[], 2), ConversationPhase::Opening);
        assert_eq!(detect_phase(&["hi", "my pension"], 2), ConversationPhase::Opening);
        assert_eq!(detect_phase(&["hi", "my pension", "and the lump sum"], 2), ConversationPhase::Middle);
    }

    #[test]
    fn test_closing_keyword_wins() {
        assert_eq!(detect_phase(&["Thanks, that's all for today"], 2), ConversationPhase::Closing);
        assert_eq!(
            detect_phase(&["thanks", "what about tax?", "and fees?"], 2),
            ConversationPhase::Middle
        );
    }

    #[test]
    fn test_latest_turn_detects_transition() {
        let turns = ["I'm so worried about running out", "I'm worried", "ok that makes sense now"];
        assert_eq!(detect_emotion(&turns), EmotionalState::Confident);
    }

    #[test]
    fn test_history_used_when_latest_is_flat() {
        let turns = ["I'm nervous about this", "what are the options?"];
        assert_eq!(detect_emotion(&turns), EmotionalState::Anxious);
    }

    #[test]
    fn test_tie_priority() {
        assert_eq!(detect_emotion(&["I'm confused and frustrated"]), EmotionalState::Frustrated);
        assert_eq!(detect_emotion(&["worried and confused"]), EmotionalState::Anxious);
    }

    #[test]
    fn test_neutral_default() {
        assert_eq!(detect_emotion(&["What is a drawdown?"]), EmotionalState::Neutral);
        assert_eq!(detect_emotion(&[]), EmotionalState::Neutral);
    }

    #[test]
    fn test_classifier_combines_both() {
        let signals = KeywordSignalClassifier::default().classify(&["hello, I'm anxious"]);
        assert_eq!(signals.phase, ConversationPhase::Opening);
        assert_eq!(signals.emotion, EmotionalState::Anxious);
    }
}
