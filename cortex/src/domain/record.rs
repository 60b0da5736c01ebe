// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! The contract every retrievable record satisfies.

use chrono::{DateTime, Utc};
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// A record that can be indexed by embedding and ranked by combined score.
pub trait ScoredRecord: Clone + Send + Sync + 'static {
    type Id: Copy + Eq + Ord + Hash + Debug + Display + Send + Sync + 'static;

    /// Label used in logs and errors ("memory", "case", "rule").
    const KIND: &'static str;

    fn id(&self) -> Self::Id;

    fn embedding(&self) -> &[f32];

    fn created_at(&self) -> DateTime<Utc>;

    /// Instant the recency factor decays from.
    fn recency_anchor(&self) -> DateTime<Utc> {
        self.created_at()
    }

    /// Static importance in `[0, 1]`.
    fn importance(&self) -> f64;

    /// Record an access at `at`. Returns `true` when the record changed and
    /// must be written back.
    fn mark_accessed(&mut self, _at: DateTime<Utc>) -> bool {
        false
    }
}
