// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process vector index.
//!
//! Records live in a sharded concurrent map, so reads never block each other
//! and a write only locks the shard holding that record. The index fixes its
//! dimensionality on the first insert.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::{relevance, ScoredRecord};
use crate::error::CortexError;

const UNSET: usize = 0;

pub struct VectorIndex<T: ScoredRecord> {
    records: DashMap<T::Id, T>,
    dimensions: AtomicUsize,
}

impl<T: ScoredRecord> VectorIndex<T> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            dimensions: AtomicUsize::new(UNSET),
        }
    }

    /// Pin the dimensionality up front instead of learning it from the first insert.
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            records: DashMap::new(),
            dimensions: AtomicUsize::new(dimensions),
        }
    }

    pub fn dimensions(&self) -> Option<usize> {
        match self.dimensions.load(Ordering::Acquire) {
            UNSET => None,
            d => Some(d),
        }
    }

    /// Accept an embedding length, fixing the dimensionality if still unset.
    pub fn check_dimensions(&self, actual: usize) -> Result<(), CortexError> {
        if actual == 0 {
            return Err(CortexError::EmptyEmbedding);
        }
        match self
            .dimensions
            .compare_exchange(UNSET, actual, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(expected) if expected == actual => Ok(()),
            Err(expected) => Err(CortexError::DimensionMismatch { expected, actual }),
        }
    }

    /// Insert or replace a record.
    pub fn add(&self, record: T) -> Result<(), CortexError> {
        self.check_dimensions(record.embedding().len())?;
        self.records.insert(record.id(), record);
        Ok(())
    }

    pub fn get(&self, id: T::Id) -> Option<T> {
        self.records.get(&id).map(|r| r.value().clone())
    }

    pub fn contains(&self, id: T::Id) -> bool {
        self.records.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Copy of every record, in no particular order.
    pub fn snapshot(&self) -> Vec<T> {
        self.records.iter().map(|r| r.value().clone()).collect()
    }

    /// Every record paired with its normalised relevance to `query`.
    pub fn similarities(&self, query: &[f32]) -> Result<Vec<(T, f64)>, CortexError> {
        if self.records.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(expected) = self.dimensions() {
            if query.len() != expected {
                return Err(CortexError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }
        Ok(self
            .records
            .iter()
            .map(|r| {
                let record = r.value().clone();
                let score = relevance(query, record.embedding());
                (record, score)
            })
            .collect())
    }

    /// Mutate one record in place under its shard lock and return the result.
    pub fn update<F>(&self, id: T::Id, mutate: F) -> Option<T>
    where
        F: FnOnce(&mut T),
    {
        let mut entry = self.records.get_mut(&id)?;
        mutate(entry.value_mut());
        Some(entry.value().clone())
    }
}

impl<T: ScoredRecord> Default for VectorIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}
