// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use super::record::ScoredRecord;
use super::scoring::clamp_unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemoryId(pub Uuid);

impl MemoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Something said or observed during a consultation
    Observation,
    /// A higher-level conclusion drawn from observations or outcomes
    Reflection,
    /// An intended future action
    Plan,
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Observation => "observation",
            MemoryKind::Reflection => "reflection",
            MemoryKind::Plan => "plan",
        }
    }
}

/// A single remembered statement. `importance` is fixed at creation;
/// only `last_accessed_at` moves afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: MemoryId,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    importance: f64,
    pub kind: MemoryKind,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub citations: BTreeSet<String>,
}

impl MemoryItem {
    pub fn new(
        description: impl Into<String>,
        kind: MemoryKind,
        importance: f64,
        embedding: Vec<f32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: MemoryId::new(),
            description: description.into(),
            created_at: now,
            last_accessed_at: now,
            importance: clamp_unit(importance),
            kind,
            embedding,
            citations: BTreeSet::new(),
        }
    }

    pub fn with_citation(mut self, citation: impl Into<String>) -> Self {
        self.citations.insert(citation.into());
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self.last_accessed_at = at;
        self
    }

    pub fn importance(&self) -> f64 {
        self.importance
    }
}

impl ScoredRecord for MemoryItem {
    type Id = MemoryId;
    const KIND: &'static str = "memory";

    fn id(&self) -> MemoryId {
        self.id
    }

    fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn recency_anchor(&self) -> DateTime<Utc> {
        self.last_accessed_at
    }

    fn importance(&self) -> f64 {
        self.importance
    }

    fn mark_accessed(&mut self, at: DateTime<Utc>) -> bool {
        if at > self.last_accessed_at {
            self.last_accessed_at = at;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_importance_is_clamped() {
        let item = MemoryItem::new("worried about pension", MemoryKind::Observation, 1.4, vec![1.0]);
        assert_eq!(item.importance(), 1.0);

        let item = MemoryItem::new("hello", MemoryKind::Observation, -0.3, vec![1.0]);
        assert_eq!(item.importance(), 0.0);
    }

    #[test]
    fn test_mark_accessed_only_moves_forward() {
        let mut item = MemoryItem::new("a", MemoryKind::Plan, 0.5, vec![1.0]);
        let earlier = item.last_accessed_at - Duration::hours(1);
        assert!(!item.mark_accessed(earlier));

        let later = item.last_accessed_at + Duration::hours(1);
        assert!(item.mark_accessed(later));
        assert_eq!(item.last_accessed_at, later);
        assert_eq!(item.recency_anchor(), later);
    }

    #[test]
    fn test_citations() {
        let item = MemoryItem::new("a", MemoryKind::Reflection, 0.5, vec![1.0])
            .with_citation("consultation:1")
            .with_citation("consultation:1");
        assert_eq!(item.citations.len(), 1);
        assert_eq!(item.kind.as_str(), "reflection");
    }
}
