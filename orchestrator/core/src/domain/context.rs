// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use counsel_cortex::{Case, MemoryItem, Rule, RuleId, Scored};

/// Output of the RetrieveContext state: ranked memories, cases and rules
/// for the question being answered.
#[derive(Debug, Clone, Default)]
pub struct RetrievedContext {
    pub memories: Vec<Scored<MemoryItem>>,
    pub cases: Vec<Scored<Case>>,
    pub rules: Vec<Scored<Rule>>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty() && self.cases.is_empty() && self.rules.is_empty()
    }

    /// Rules surfaced to the model; these are the rules a turn "cites".
    pub fn rule_ids(&self) -> Vec<RuleId> {
        self.rules.iter().map(|s| s.record.id).collect()
    }
}
