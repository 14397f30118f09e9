//! Background consumption of one topic.

use super::broker::{MessageTransport, Subscription};
use super::DomainEvent;
use crate::error::{ServiceError, TransportError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Reacts to one delivered event.
///
/// May be called more than once for the same event. Returning an error only
/// gets it logged: the consumer moves on and nothing is redelivered.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: DomainEvent) -> Result<(), ServiceError>;
}

/// Runs an [`EventHandler`] over a topic on its own task.
///
/// Events are handled one at a time, so a slow handler slows this loop and
/// nothing else. The loop ends when the transport closes the topic.
pub struct EventConsumer;

impl EventConsumer {
    /// Subscribes to `topic` and spawns the consume loop.
    ///
    /// The subscription exists by the time this returns, so anything
    /// published afterwards is seen by the handler.
    pub async fn spawn(
        transport: Arc<dyn MessageTransport>,
        topic: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<JoinHandle<()>, TransportError> {
        let subscription = transport.subscribe(topic).await?;
        info!(topic, "Started event consumer");
        Ok(tokio::spawn(Self::run(subscription, handler)))
    }

    async fn run(mut subscription: Subscription, handler: Arc<dyn EventHandler>) {
        let mut handled = 0u64;
        let mut failed = 0u64;

        while let Some(payload) = subscription.next().await {
            let event: DomainEvent = match serde_json::from_slice(&payload) {
                Ok(event) => event,
                Err(e) => {
                    warn!(topic = subscription.topic(), error = %e, "Undecodable event skipped");
                    failed += 1;
                    continue;
                }
            };

            debug!(topic = subscription.topic(), kind = %event.kind, "Received event");
            match handler.handle(event).await {
                Ok(()) => handled += 1,
                Err(e) => {
                    error!(topic = subscription.topic(), error = %e, "Event handler failed");
                    failed += 1;
                }
            }
        }

        info!(topic = subscription.topic(), handled, failed, "Event consumer stopped");
    }
}
