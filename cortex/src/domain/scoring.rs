// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Scoring maths shared by every store.
//!
//! - **Relevance:** cosine similarity mapped to `[0, 1]` via `(cos + 1) / 2`.
//! - **Recency:** `exp(-λ * hours_since_last_access)`, `λ = ln 2 / half_life`.
//! - **Combined:** `w_r * recency + w_i * importance + w_v * relevance`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Clamp a score into `[0, 1]`. NaN collapses to `0`.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Per-call weights for the three ranking factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalWeights {
    pub recency: f64,
    pub importance: f64,
    pub relevance: f64,
}

impl RetrievalWeights {
    pub const fn new(recency: f64, importance: f64, relevance: f64) -> Self {
        Self {
            recency,
            importance,
            relevance,
        }
    }

    /// Defaults for memory retrieval: 0.2 / 0.3 / 0.5.
    pub const fn memory() -> Self {
        Self::new(0.2, 0.3, 0.5)
    }

    /// Defaults for case and rule retrieval: 0 / 0.2 / 0.8.
    /// Precedent lookup barely cares how recently a record was touched.
    pub const fn precedent() -> Self {
        Self::new(0.0, 0.2, 0.8)
    }

    /// Relevance only.
    pub const fn relevance_only() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }

    /// Every weight is finite and inside `[0, 1]`.
    pub fn is_valid(&self) -> bool {
        [self.recency, self.importance, self.relevance]
            .iter()
            .all(|w| w.is_finite() && (0.0..=1.0).contains(w))
    }

    pub fn combine(&self, recency: f64, importance: f64, relevance: f64) -> f64 {
        self.recency * recency + self.importance * importance + self.relevance * relevance
    }
}

impl Default for RetrievalWeights {
    fn default() -> Self {
        Self::memory()
    }
}

/// Exponential recency decay parameterised by half-life.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecencyDecay {
    lambda_per_hour: f64,
}

impl RecencyDecay {
    pub const DEFAULT_HALF_LIFE_HOURS: f64 = 24.0;

    pub fn with_half_life_hours(half_life_hours: f64) -> Self {
        let half_life = if half_life_hours.is_finite() && half_life_hours > 0.0 {
            half_life_hours
        } else {
            Self::DEFAULT_HALF_LIFE_HOURS
        };
        Self {
            lambda_per_hour: std::f64::consts::LN_2 / half_life,
        }
    }

    pub fn lambda_per_hour(&self) -> f64 {
        self.lambda_per_hour
    }

    /// Recency for a gap expressed in hours. Negative gaps (clock skew) count as zero.
    pub fn score_hours(&self, hours_since_access: f64) -> f64 {
        if !hours_since_access.is_finite() {
            return 0.0;
        }
        (-self.lambda_per_hour * hours_since_access.max(0.0)).exp()
    }

    pub fn score(&self, last_access: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let millis = (now - last_access).num_milliseconds() as f64;
        self.score_hours(millis / 3_600_000.0)
    }
}

impl Default for RecencyDecay {
    fn default() -> Self {
        Self::with_half_life_hours(Self::DEFAULT_HALF_LIFE_HOURS)
    }
}

/// Raw cosine similarity in `[-1, 1]`. Zero-norm vectors yield `0`.
/// Callers guarantee equal lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Cosine similarity normalised into `[0, 1]`.
pub fn relevance(query: &[f32], embedding: &[f32]) -> f64 {
    clamp_unit((cosine_similarity(query, embedding) + 1.0) / 2.0)
}
