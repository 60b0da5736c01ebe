// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Domain Events
//
// Provides in-memory event streaming using tokio broadcast channels.
// Carries both knowledge-base events (memories, cases, rules) and guidance
// events (turns, background validations, learning rejections) for audit
// and for observers such as the CLI.
//
// In-memory only: events are lost on restart.

use counsel_cortex::CortexEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::consultation::ConsultationId;
use crate::domain::events::GuidanceEvent;

/// Unified domain event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Cortex(CortexEvent),
    Guidance(GuidanceEvent),
}

impl DomainEvent {
    pub fn consultation_id(&self) -> Option<ConsultationId> {
        match self {
            DomainEvent::Cortex(event) => event.consultation_id().map(ConsultationId),
            DomainEvent::Guidance(event) => Some(event.consultation_id()),
        }
    }
}

/// Broadcast hub for domain events. Cloning shares the channel.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Slow receivers lose the oldest events once `capacity` are buffered.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }

    pub fn publish_cortex_event(&self, event: CortexEvent) {
        self.publish(DomainEvent::Cortex(event));
    }

    pub fn publish_guidance_event(&self, event: GuidanceEvent) {
        self.publish(DomainEvent::Guidance(event));
    }

    fn publish(&self, event: DomainEvent) {
        debug!(consultation_id = ?event.consultation_id(), "Publishing event: {:?}", event);
        // send() only fails when nobody is listening
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to event");
        }
    }

    /// Every event, from every consultation
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            consultation_id: None,
        }
    }

    /// Only events tagged with `consultation_id`. Untagged cortex events are skipped.
    pub fn subscribe_consultation(&self, consultation_id: ConsultationId) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            consultation_id: Some(consultation_id),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
    consultation_id: Option<ConsultationId>,
}

impl EventReceiver {
    fn wanted(&self, event: &DomainEvent) -> bool {
        match self.consultation_id {
            Some(id) => event.consultation_id() == Some(id),
            None => true,
        }
    }

    /// Next matching event, waiting as long as it takes
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => EventBusError::Closed,
                broadcast::error::RecvError::Lagged(n) => lagged(n),
            })?;
            if self.wanted(&event) {
                return Ok(event);
            }
        }
    }

    /// Next matching event already buffered, if any
    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        loop {
            let event = self.receiver.try_recv().map_err(|e| match e {
                broadcast::error::TryRecvError::Empty => EventBusError::Empty,
                broadcast::error::TryRecvError::Closed => EventBusError::Closed,
                broadcast::error::TryRecvError::Lagged(n) => lagged(n),
            })?;
            if self.wanted(&event) {
                return Ok(event);
            }
        }
    }

    /// Like `recv`, but gives up with `Empty` after `wait`.
    pub async fn recv_timeout(&mut self, wait: Duration) -> Result<DomainEvent, EventBusError> {
        tokio::time::timeout(wait, self.recv())
            .await
            .unwrap_or(Err(EventBusError::Empty))
    }
}

fn lagged(n: u64) -> EventBusError {
    warn!("Event receiver lagged by {} events", n);
    EventBusError::Lagged(n)
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
