// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # ScoredStore - Weighted-Ranking Retrieval
//!
//! Generic store shared by memories, cases and rules. Writes go to the
//! [`PersistentStore`] first and only then into the in-process
//! [`VectorIndex`], so a failed write never leaves an indexed-but-unsaved
//! record behind.
//!
//! ## Ordering
//!
//! Results are sorted by descending combined score; ties go to the most
//! recent `created_at`, then to the smaller id so repeated calls on an
//! unchanged store return identical sequences. Scores are computed from a
//! single `now` before any access timestamps are bumped, so the bump of one
//! result cannot reorder the others within the same call.
//!
//! ## Concurrency
//!
//! Reads are lock-free with respect to each other. Writes to one record
//! (access bumps, updates) are serialised through a per-record async lock;
//! unrelated records never contend.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{clamp_unit, RecencyDecay, RetrievalWeights, ScoredRecord};
use crate::error::CortexError;
use crate::infrastructure::{PersistentStore, VectorIndex};

/// A retrieved record together with its score breakdown
#[derive(Debug, Clone)]
pub struct Scored<T> {
    pub record: T,
    pub score: f64,
    pub recency: f64,
    pub importance: f64,
    pub relevance: f64,
}

/// Rank `(record, relevance)` pairs at instant `now` and keep the best `top_k`.
pub fn rank<T: ScoredRecord>(
    candidates: Vec<(T, f64)>,
    now: DateTime<Utc>,
    weights: &RetrievalWeights,
    decay: &RecencyDecay,
    top_k: usize,
) -> Vec<Scored<T>> {
    if top_k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<Scored<T>> = candidates
        .into_iter()
        .map(|(record, relevance)| {
            let recency = decay.score(record.recency_anchor(), now);
            let importance = clamp_unit(record.importance());
            let relevance = clamp_unit(relevance);
            let score = weights.combine(recency, importance, relevance);
            Scored {
                record,
                score,
                recency,
                importance,
                relevance,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.record.created_at().cmp(&a.record.created_at()))
            .then_with(|| a.record.id().cmp(&b.record.id()))
    });
    scored.truncate(top_k);
    scored
}

pub struct ScoredStore<T: ScoredRecord> {
    index: VectorIndex<T>,
    persistence: Arc<dyn PersistentStore<T>>,
    decay: RecencyDecay,
    default_weights: RetrievalWeights,
    write_locks: DashMap<T::Id, Arc<Mutex<()>>>,
}

impl<T: ScoredRecord> ScoredStore<T> {
    pub fn new(persistence: Arc<dyn PersistentStore<T>>, default_weights: RetrievalWeights) -> Self {
        Self {
            index: VectorIndex::new(),
            persistence,
            decay: RecencyDecay::default(),
            default_weights,
            write_locks: DashMap::new(),
        }
    }

    pub fn with_decay(mut self, decay: RecencyDecay) -> Self {
        self.decay = decay;
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.index = VectorIndex::with_dimensions(dimensions);
        self
    }

    pub fn default_weights(&self) -> RetrievalWeights {
        self.default_weights
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn get(&self, id: T::Id) -> Option<T> {
        self.index.get(id)
    }

    /// Every indexed record, in no particular order.
    pub fn all(&self) -> Vec<T> {
        self.index.snapshot()
    }

    fn write_lock(&self, id: T::Id) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Load every persisted record into the index. Returns the number loaded.
    pub async fn warm(&self) -> Result<usize, CortexError> {
        let records = self.persistence.scan().await?;
        let count = records.len();
        for record in records {
            self.index.add(record)?;
        }
        debug!(kind = T::KIND, count, "Warmed store from persistence");
        Ok(count)
    }

    /// Persist and index a new record.
    pub async fn add(&self, record: T) -> Result<T::Id, CortexError> {
        let id = record.id();
        self.index.check_dimensions(record.embedding().len())?;

        let lock = self.write_lock(id);
        let _guard = lock.lock().await;

        self.persistence.put(&record).await?;
        self.index.add(record)?;
        debug!(kind = T::KIND, %id, "Stored record");
        Ok(id)
    }

    /// Rank the store against `query` and return the best `top_k` records.
    ///
    /// `weights = None` uses the store's defaults. `top_k == 0` and an empty
    /// store both yield an empty result.
    pub async fn retrieve(
        &self,
        query: &[f32],
        top_k: usize,
        weights: Option<RetrievalWeights>,
    ) -> Result<Vec<Scored<T>>, CortexError> {
        if top_k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }

        let weights = weights.unwrap_or(self.default_weights);
        let now = Utc::now();
        let candidates = self.index.similarities(query)?;
        let mut ranked = rank(candidates, now, &weights, &self.decay, top_k);

        for scored in ranked.iter_mut() {
            if let Some(touched) = self.touch(scored.record.id(), now).await {
                scored.record = touched;
            }
        }

        Ok(ranked)
    }

    /// Bump the access time of one record. Persisting the bump is best-effort.
    async fn touch(&self, id: T::Id, now: DateTime<Utc>) -> Option<T> {
        let lock = self.write_lock(id);
        let _guard = lock.lock().await;

        let mut changed = false;
        let touched = self.index.update(id, |record| changed = record.mark_accessed(now))?;
        if changed {
            if let Err(e) = self.persistence.put(&touched).await {
                warn!(kind = T::KIND, %id, error = %e, "Failed to persist access time");
            }
        }
        Some(touched)
    }

    /// Apply `mutate` to one record, persist it, then publish it to the index.
    /// Concurrent updates of the same record are applied one after another.
    pub async fn update<F, R>(&self, id: T::Id, mutate: F) -> Result<(T, R), CortexError>
    where
        F: FnOnce(&mut T) -> R + Send,
        R: Send,
    {
        let lock = self.write_lock(id);
        let _guard = lock.lock().await;

        let mut record = self.index.get(id).ok_or_else(|| CortexError::NotFound {
            store: T::KIND,
            id: id.to_string(),
        })?;
        let result = mutate(&mut record);

        self.persistence.put(&record).await?;
        self.index.add(record.clone())?;
        Ok((record, result))
    }
}
