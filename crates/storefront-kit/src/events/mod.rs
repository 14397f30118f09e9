//! # Domain Events
//!
//! One-directional, fire-and-forget notifications between services.
//!
//! ## Guarantees
//!
//! - **At-most-once production**: a usecase makes one publish attempt per
//!   committed mutation, after the store write. A failed attempt is logged
//!   by [`SideChannel`] and never reaches the caller.
//! - **No ordering** across resources; within a topic only as strong as the
//!   transport.
//! - **Duplicates are possible** on at-least-once transports and are not
//!   deduplicated. Handlers should tolerate them.
//!
//! [`SideChannel`] is the seam where an outbox or retry layer would go.

mod broker;
mod consumer;

pub use broker::{MemoryBroker, MessageTransport, Subscription, DEFAULT_BROKER_CAPACITY};
pub use consumer::{EventConsumer, EventHandler};

use crate::error::PublishError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    ResourceCreated,
    ResourceUpdated,
    ResourceDeleted,
}

impl EventKind {
    fn verb(self) -> &'static str {
        match self {
            EventKind::ResourceCreated => "created",
            EventKind::ResourceUpdated => "updated",
            EventKind::ResourceDeleted => "deleted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Topic name for events of `kind` about `resource`, e.g. `"order.created"`.
pub fn topic(resource: &str, kind: EventKind) -> String {
    format!("{resource}.{}", kind.verb())
}

/// An immutable fact about a committed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub kind: EventKind,
    pub resource: String,
    pub payload: serde_json::Value,
    pub produced_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new<P: Serialize>(
        kind: EventKind,
        resource: impl Into<String>,
        payload: &P,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind,
            resource: resource.into(),
            payload: serde_json::to_value(payload)?,
            produced_at: Utc::now(),
        })
    }

    pub fn topic(&self) -> String {
        topic(&self.resource, self.kind)
    }

    /// Decodes the payload into the producer's payload type.
    pub fn decode<P: DeserializeOwned>(&self) -> Result<P, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Sends a [`DomainEvent`] to its topic.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError>;
}

/// [`EventPublisher`] that serialises events as JSON onto a [`MessageTransport`].
#[derive(Clone)]
pub struct TransportPublisher {
    transport: Arc<dyn MessageTransport>,
}

impl TransportPublisher {
    pub fn new(transport: Arc<dyn MessageTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl EventPublisher for TransportPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let topic = event.topic();
        let payload = serde_json::to_vec(event)?;
        debug!(%topic, payload_size = payload.len(), "Publishing event");
        self.transport.publish(&topic, payload).await?;
        Ok(())
    }
}

/// Best-effort outbound channel used by usecases.
///
/// `emit` never fails and never retries: the mutation that produced the event
/// has already committed, so a lost event is logged and accepted.
#[derive(Clone)]
pub struct SideChannel {
    publisher: Arc<dyn EventPublisher>,
}

impl SideChannel {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    pub async fn emit(&self, event: DomainEvent) {
        let topic = event.topic();
        match self.publisher.publish(&event).await {
            Ok(()) => debug!(%topic, "Event published"),
            Err(e) => warn!(%topic, error = %e, "Event dropped"),
        }
    }

    /// Builds the event from `payload` and emits it.
    pub async fn emit_payload<P: Serialize + Sync>(&self, kind: EventKind, resource: &str, payload: &P) {
        match DomainEvent::new(kind, resource, payload) {
            Ok(event) => self.emit(event).await,
            Err(e) => warn!(resource, %kind, error = %e, "Event payload encode failed, event dropped"),
        }
    }
}
