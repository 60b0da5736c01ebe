// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Consultation Ledger
//!
//! Per-consultation transcript, cited rules and carried-forward compliance
//! issues. Each consultation has its own async turn lock: a turn holds a
//! [`TurnGuard`] from context retrieval until its text is appended, so
//! history is strictly append-ordered while distinct consultations never
//! contend.
//!
//! Entries leave the ledger when an outcome is recorded, when the caller
//! abandons the consultation, or when [`ConsultationLedger::evict_idle`]
//! finds them untouched for too long.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry as Slot;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

use counsel_cortex::RuleId;

use crate::domain::consultation::{ConsultationId, CustomerProfile, Turn};
use crate::domain::error::GuidanceError;
use crate::domain::learning::{LearnedLesson, LearningProgress, RuleRecalibration};

/// Read-only copy of a consultation's state
#[derive(Debug, Clone)]
pub struct ConsultationRecord {
    pub consultation_id: ConsultationId,
    pub customer: CustomerProfile,
    pub task_type: String,
    pub transcript: Vec<Turn>,
    pub cited_rules: BTreeSet<RuleId>,
    pub pending_issues: Vec<String>,
    pub opened_at: DateTime<Utc>,
}

struct ConsultationState {
    customer: CustomerProfile,
    task_type: String,
    transcript: Vec<Turn>,
    cited_rules: BTreeSet<RuleId>,
    pending_issues: Vec<String>,
    opened_at: DateTime<Utc>,
    last_activity: Instant,
    learning: LearningProgress,
}

struct LedgerEntry {
    turn_lock: Arc<tokio::sync::Mutex<()>>,
    state: Mutex<ConsultationState>,
}

impl LedgerEntry {
    fn record(&self, consultation_id: ConsultationId) -> ConsultationRecord {
        let state = self.state.lock();
        ConsultationRecord {
            consultation_id,
            customer: state.customer.clone(),
            task_type: state.task_type.clone(),
            transcript: state.transcript.clone(),
            cited_rules: state.cited_rules.clone(),
            pending_issues: state.pending_issues.clone(),
            opened_at: state.opened_at,
        }
    }
}

#[derive(Default)]
pub struct ConsultationLedger {
    entries: DashMap<ConsultationId, Arc<LedgerEntry>>,
}

impl ConsultationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a consultation. Re-opening refreshes the customer
    /// profile and task type but keeps the transcript.
    pub fn open(&self, consultation_id: ConsultationId, customer: CustomerProfile, task_type: impl Into<String>) {
        let task_type = task_type.into();
        match self.entries.entry(consultation_id) {
            Slot::Occupied(existing) => {
                let mut state = existing.get().state.lock();
                state.customer = customer;
                state.task_type = task_type;
                state.last_activity = Instant::now();
            }
            Slot::Vacant(slot) => {
                debug!(%consultation_id, "Opened consultation");
                slot.insert(Arc::new(LedgerEntry {
                    turn_lock: Arc::new(tokio::sync::Mutex::new(())),
                    state: Mutex::new(ConsultationState {
                        customer,
                        task_type,
                        transcript: Vec::new(),
                        cited_rules: BTreeSet::new(),
                        pending_issues: Vec::new(),
                        opened_at: Utc::now(),
                        last_activity: Instant::now(),
                        learning: LearningProgress::default(),
                    }),
                }));
            }
        }
    }

    pub fn contains(&self, consultation_id: ConsultationId) -> bool {
        self.entries.contains_key(&consultation_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, consultation_id: ConsultationId) -> Result<Arc<LedgerEntry>, GuidanceError> {
        self.entries
            .get(&consultation_id)
            .map(|e| e.value().clone())
            .ok_or(GuidanceError::UnknownConsultation(consultation_id))
    }

    /// Wait for any in-flight turn on the consultation, then take its lock.
    pub async fn begin_turn(&self, consultation_id: ConsultationId) -> Result<TurnGuard, GuidanceError> {
        let entry = self.entry(consultation_id)?;
        let lock = entry.turn_lock.clone().lock_owned().await;
        Ok(TurnGuard {
            consultation_id,
            entry,
            _lock: lock,
        })
    }

    pub fn snapshot(&self, consultation_id: ConsultationId) -> Option<ConsultationRecord> {
        self.entries
            .get(&consultation_id)
            .map(|e| e.value().record(consultation_id))
    }

    /// Queue issues from a failed background validation for the next turn.
    /// Does not take the turn lock; a closed consultation drops them.
    pub fn carry_issues(&self, consultation_id: ConsultationId, issues: Vec<String>) -> bool {
        match self.entries.get(&consultation_id) {
            Some(entry) => {
                entry.state.lock().pending_issues.extend(issues);
                true
            }
            None => false,
        }
    }

    /// Drop a consultation without learning from it. Waits for a turn still
    /// running on it.
    pub async fn abandon(&self, consultation_id: ConsultationId) -> Result<ConsultationRecord, GuidanceError> {
        let turn = self.begin_turn(consultation_id).await?;
        debug!(%consultation_id, "Abandoning consultation");
        Ok(turn.close(self))
    }

    /// Drop consultations with no activity for `max_idle`. Entries with a
    /// turn in flight are kept. Returns how many were evicted.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|consultation_id, entry| {
            if entry.turn_lock.try_lock().is_err() {
                return true;
            }
            let idle = entry.state.lock().last_activity.elapsed();
            if idle < max_idle {
                return true;
            }
            debug!(%consultation_id, idle_secs = idle.as_secs(), "Evicting idle consultation");
            false
        });
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            info!(evicted, remaining = self.entries.len(), "Evicted idle consultations");
        }
        evicted
    }

    fn remove(&self, consultation_id: ConsultationId) {
        self.entries.remove(&consultation_id);
    }
}

/// Exclusive access to one consultation for the duration of a turn
pub struct TurnGuard {
    consultation_id: ConsultationId,
    entry: Arc<LedgerEntry>,
    _lock: OwnedMutexGuard<()>,
}

impl TurnGuard {
    pub fn consultation_id(&self) -> ConsultationId {
        self.consultation_id
    }

    pub fn record(&self) -> ConsultationRecord {
        self.entry.record(self.consultation_id)
    }

    /// Issues carried forward from earlier turns, oldest first. They stay
    /// queued until a turn that saw them appends its exchange.
    pub fn pending_issues(&self) -> Vec<String> {
        self.entry.state.lock().pending_issues.clone()
    }

    /// Append a completed exchange and the rules it cited, draining the
    /// first `consumed_issues` carried-forward issues the turn addressed.
    pub fn append_exchange(
        &self,
        customer: Turn,
        advisor: Turn,
        cited: impl IntoIterator<Item = RuleId>,
        consumed_issues: usize,
    ) {
        let mut state = self.entry.state.lock();
        state.transcript.push(customer);
        state.transcript.push(advisor);
        state.cited_rules.extend(cited);
        let consumed = consumed_issues.min(state.pending_issues.len());
        state.pending_issues.drain(..consumed);
        state.last_activity = Instant::now();
    }

    /// Learning already applied by an earlier attempt to record the outcome.
    pub fn learning_progress(&self) -> LearningProgress {
        self.entry.state.lock().learning.clone()
    }

    pub fn note_lesson(&self, lesson: LearnedLesson) {
        self.entry.state.lock().learning.lesson = Some(lesson);
    }

    pub fn note_recalibration(&self, recalibration: RuleRecalibration) {
        self.entry.state.lock().learning.recalibrated.push(recalibration);
    }

    /// Stop tracking the consultation. Consumes the guard so no later turn
    /// of this consultation can observe a half-closed state.
    pub fn close(self, ledger: &ConsultationLedger) -> ConsultationRecord {
        let record = self.record();
        ledger.remove(self.consultation_id);
        debug!(consultation_id = %self.consultation_id, turns = record.transcript.len(), "Closed consultation");
        record
    }
}
