//! In-process topic broker.
//!
//! Backed by one `tokio::sync::broadcast` channel per topic, so it has the
//! weakest delivery the services are written for:
//!
//! - at-most-once: a subscriber that falls more than `capacity` messages
//!   behind loses the oldest ones
//! - publishing to a topic nobody subscribes to succeeds and drops the message
//! - no replay for late subscribers

use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

pub const DEFAULT_BROKER_CAPACITY: usize = 1024;

/// Topic-based publish/subscribe.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    async fn subscribe(&self, topic: &str) -> Result<Subscription, TransportError>;
}

/// A live subscription to one topic.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    receiver: broadcast::Receiver<Vec<u8>>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, receiver: broadcast::Receiver<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            receiver,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next message, or `None` once the transport has closed the topic.
    ///
    /// Messages lost to lag are logged and skipped.
    pub async fn next(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => return Some(payload),
                Err(RecvError::Lagged(missed)) => {
                    warn!(topic = %self.topic, missed, "Subscriber lagged, messages lost");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// In-memory [`MessageTransport`].
#[derive(Debug)]
pub struct MemoryBroker {
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>,
    closed: AtomicBool,
}

impl MemoryBroker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Stops the broker: later publishes fail with [`TransportError::Closed`]
    /// and every subscription ends after draining what it already received.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut topics) = self.topics.lock() {
            info!(topics = topics.len(), "Broker closed");
            topics.clear();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .ok()
            .and_then(|topics| topics.get(topic).map(|tx| tx.receiver_count()))
            .unwrap_or(0)
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(DEFAULT_BROKER_CAPACITY)
    }
}

#[async_trait]
impl MessageTransport for MemoryBroker {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let topics = self
            .topics
            .lock()
            .map_err(|_| TransportError::Other("broker lock poisoned".into()))?;

        match topics.get(topic).map(|tx| tx.send(payload)) {
            Some(Ok(receivers)) => debug!(topic, receivers, "Delivered"),
            _ => debug!(topic, "No subscribers, message dropped"),
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut topics = self
            .topics
            .lock()
            .map_err(|_| TransportError::Other("broker lock poisoned".into()))?;

        let receiver = topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        info!(topic, "Subscribed");
        Ok(Subscription::new(topic, receiver))
    }
}
