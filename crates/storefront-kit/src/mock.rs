//! # Test Doubles
//!
//! Two kinds of doubles live here.
//!
//! ## Channel-level store mocks
//!
//! [`create_mock_store`] hands out a real [`StoreClient`] whose requests land
//! on a receiver the test owns. The test pulls each request off with an
//! `expect_*` helper, asserts on it, and answers through the returned
//! `respond_to` sender. Nothing is spawned, so the test decides exactly what
//! the "store" says and can prove that a code path sent no request at all
//! ([`expect_no_request`]).
//!
//! ```rust
//! use storefront_kit::mock::{create_mock_store, expect_insert};
//! use storefront_kit::Counter;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (client, mut requests) = create_mock_store::<Counter>(4);
//!
//!     let caller = tokio::spawn(async move {
//!         client
//!             .insert(Counter { resource_type: "order".into(), value: 0 })
//!             .await
//!     });
//!
//!     let (doc, respond_to) = expect_insert(&mut requests).await.unwrap();
//!     assert_eq!(doc.resource_type, "order");
//!     respond_to.send(Ok(())).unwrap();
//!
//!     assert!(caller.await.unwrap().is_ok());
//! }
//! ```
//!
//! ## Failing collaborators
//!
//! | Double | Stands in for | Behaviour |
//! |--------|---------------|-----------|
//! | [`OfflineCounterStore`] | counter store | every increment fails with `Unavailable` |
//! | [`FailingPublisher`] | event publisher | every publish fails with a closed transport |
//! | [`RecordingPublisher`] | event publisher | succeeds and keeps every event |
//! | [`FailingCache`] | cache backend | every call fails |

use crate::allocator::CounterStore;
use crate::cache::CacheBackend;
use crate::client::StoreClient;
use crate::document::{Document, Page};
use crate::error::{CacheError, PublishError, StoreError, TransportError};
use crate::events::{DomainEvent, EventPublisher};
use crate::message::{Response, StoreRequest};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// A client wired to a receiver the test controls.
pub fn create_mock_store<T: Document>(
    buffer_size: usize,
) -> (StoreClient<T>, mpsc::Receiver<StoreRequest<T>>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (StoreClient::new(sender), receiver)
}

pub async fn expect_insert<T: Document>(
    receiver: &mut mpsc::Receiver<StoreRequest<T>>,
) -> Option<(T, Response<()>)> {
    match receiver.recv().await {
        Some(StoreRequest::Insert { doc, respond_to }) => Some((doc, respond_to)),
        _ => None,
    }
}

pub async fn expect_find_one<T: Document>(
    receiver: &mut mpsc::Receiver<StoreRequest<T>>,
) -> Option<(T::Filter, Response<Option<T>>)> {
    match receiver.recv().await {
        Some(StoreRequest::FindOne { filter, respond_to }) => Some((filter, respond_to)),
        _ => None,
    }
}

pub async fn expect_find<T: Document>(
    receiver: &mut mpsc::Receiver<StoreRequest<T>>,
) -> Option<(T::Filter, Page, Response<(Vec<T>, u64)>)> {
    match receiver.recv().await {
        Some(StoreRequest::Find {
            filter,
            page,
            respond_to,
        }) => Some((filter, page, respond_to)),
        _ => None,
    }
}

pub async fn expect_update_one<T: Document>(
    receiver: &mut mpsc::Receiver<StoreRequest<T>>,
) -> Option<(T::Filter, T::Patch, Response<Option<T>>)> {
    match receiver.recv().await {
        Some(StoreRequest::UpdateOne {
            filter,
            patch,
            respond_to,
        }) => Some((filter, patch, respond_to)),
        _ => None,
    }
}

pub async fn expect_delete_one<T: Document>(
    receiver: &mut mpsc::Receiver<StoreRequest<T>>,
) -> Option<(T::Filter, Response<Option<T>>)> {
    match receiver.recv().await {
        Some(StoreRequest::DeleteOne { filter, respond_to }) => Some((filter, respond_to)),
        _ => None,
    }
}

/// Panics if a request is waiting on the channel.
pub fn expect_no_request<T: Document>(receiver: &mut mpsc::Receiver<StoreRequest<T>>) {
    if let Ok(request) = receiver.try_recv() {
        panic!("unexpected store request: {request:?}");
    }
}

/// Counter store whose backing store is down.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineCounterStore;

#[async_trait]
impl CounterStore for OfflineCounterStore {
    async fn find_and_increment(&self, _key: &str) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable)
    }
}

/// Publisher whose transport is down.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _event: &DomainEvent) -> Result<(), PublishError> {
        Err(PublishError::Transport(TransportError::Closed))
    }
}

/// Publisher that keeps every event it is given.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn topics(&self) -> Vec<String> {
        self.events().iter().map(DomainEvent::topic).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        Ok(())
    }
}

/// Cache backend that is unreachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingCache;

#[async_trait]
impl CacheBackend for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Err(CacheError::Backend("cache offline".into()))
    }

    async fn set(&self, _key: &str, _payload: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Backend("cache offline".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Backend("cache offline".into()))
    }
}
