// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the Cortex bounded context
//! Published whenever the knowledge base gains a record or a rule is recalibrated

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::case::CaseId;
use super::memory::{MemoryId, MemoryKind};
use super::rule::RuleId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CortexEvent {
    /// A statement was judged important enough to remember
    MemoryRecorded {
        memory_id: MemoryId,
        consultation_id: Option<Uuid>,
        kind: MemoryKind,
        importance: f64,
        timestamp: DateTime<Utc>,
    },

    /// A successful consultation became a precedent
    CaseStored {
        case_id: CaseId,
        consultation_id: Option<Uuid>,
        task_type: String,
        quality: f64,
        has_dialogue_techniques: bool,
        timestamp: DateTime<Utc>,
    },

    /// A failure produced a principle that passed every gate
    RuleCreated {
        rule_id: RuleId,
        consultation_id: Option<Uuid>,
        domain: String,
        confidence: f64,
        timestamp: DateTime<Utc>,
    },

    /// A cited rule absorbed a consultation outcome
    RuleConfidenceUpdated {
        rule_id: RuleId,
        consultation_id: Option<Uuid>,
        success: bool,
        old_confidence: f64,
        new_confidence: f64,
        uses: u64,
        timestamp: DateTime<Utc>,
    },
}

impl CortexEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            CortexEvent::MemoryRecorded { timestamp, .. } => *timestamp,
            CortexEvent::CaseStored { timestamp, .. } => *timestamp,
            CortexEvent::RuleCreated { timestamp, .. } => *timestamp,
            CortexEvent::RuleConfidenceUpdated { timestamp, .. } => *timestamp,
        }
    }

    pub fn consultation_id(&self) -> Option<Uuid> {
        match self {
            CortexEvent::MemoryRecorded { consultation_id, .. } => *consultation_id,
            CortexEvent::CaseStored { consultation_id, .. } => *consultation_id,
            CortexEvent::RuleCreated { consultation_id, .. } => *consultation_id,
            CortexEvent::RuleConfidenceUpdated { consultation_id, .. } => *consultation_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            CortexEvent::MemoryRecorded { .. } => "memory_recorded",
            CortexEvent::CaseStored { .. } => "case_stored",
            CortexEvent::RuleCreated { .. } => "rule_created",
            CortexEvent::RuleConfidenceUpdated { .. } => "rule_confidence_updated",
        }
    }
}
