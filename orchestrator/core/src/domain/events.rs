// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::compliance::{Route, Verdict};
use crate::domain::consultation::ConsultationId;
use crate::domain::learning::LearningStage;

/// Guidance pipeline events, published for audit and live observers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuidanceEvent {
    TurnCompleted {
        consultation_id: ConsultationId,
        /// `None` for streamed turns, whose verdict arrives later
        route: Option<Route>,
        streamed: bool,
        generation_calls: u32,
        completed_at: DateTime<Utc>,
    },
    StreamValidationCompleted {
        consultation_id: ConsultationId,
        verdict: Verdict,
        validated_at: DateTime<Utc>,
    },
    /// Already-delivered text failed compliance. Issues carry forward into
    /// the next turn's prompt.
    StreamValidationFailed {
        consultation_id: ConsultationId,
        issues: Vec<String>,
        failed_at: DateTime<Utc>,
    },
    LearningRejected {
        consultation_id: ConsultationId,
        stage: LearningStage,
        reason: String,
        rejected_at: DateTime<Utc>,
    },
}

impl GuidanceEvent {
    pub fn consultation_id(&self) -> ConsultationId {
        match self {
            GuidanceEvent::TurnCompleted { consultation_id, .. }
            | GuidanceEvent::StreamValidationCompleted { consultation_id, .. }
            | GuidanceEvent::StreamValidationFailed { consultation_id, .. }
            | GuidanceEvent::LearningRejected { consultation_id, .. } => *consultation_id,
        }
    }
}
