//! # In-Memory Store of Record
//!
//! This module defines the `StoreActor`, an in-memory stand-in for the
//! document store. It implements the "Server" side of the actor model: it
//! owns one collection and processes requests sequentially, so every request
//! is atomic with respect to every other request on that collection.

use crate::client::StoreClient;
use crate::document::Document;
use crate::error::StoreError;
use crate::message::StoreRequest;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// The actor that owns one collection of documents.
///
/// # Concurrency Model
/// Any number of [`StoreClient`] clones may send requests concurrently. The
/// actor reads them one at a time, so a `FindOne` followed by an `UpdateOne`
/// from the same caller can interleave with other callers, but a single
/// `UpdateOne` or `UpsertOne` cannot. That is the whole atomicity contract:
/// read-modify-write sequences that must not race have to be expressed as one
/// guarded request.
///
/// # Usage Pattern
///
/// ```rust
/// use storefront_kit::{Counter, CounterStore, StoreActor};
///
/// #[tokio::main]
/// async fn main() {
///     // 1. Create
///     let (actor, client) = StoreActor::<Counter>::new(16);
///
///     // 2. Run
///     tokio::spawn(actor.run());
///
///     // 3. Use
///     let first = client.find_and_increment("order").await.unwrap();
///     assert_eq!(first, 1);
/// }
/// ```
pub struct StoreActor<T: Document> {
    receiver: mpsc::Receiver<StoreRequest<T>>,
    docs: BTreeMap<T::Id, T>,
}

impl<T: Document> StoreActor<T> {
    /// Creates a new `StoreActor` and its associated `StoreClient`.
    ///
    /// `buffer_size` is the capacity of the request channel. When it is full,
    /// callers wait for space.
    pub fn new(buffer_size: usize) -> (Self, StoreClient<T>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            receiver,
            docs: BTreeMap::new(),
        };
        (actor, StoreClient::new(sender))
    }

    /// Runs the request loop until every client has been dropped.
    pub async fn run(mut self) {
        let kind = T::KIND;
        info!(kind, "Store started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                StoreRequest::Insert { doc, respond_to } => {
                    let id = doc.id().clone();
                    if self.docs.contains_key(&id) {
                        warn!(kind, %id, "Duplicate key");
                        let _ = respond_to.send(Err(StoreError::DuplicateKey(format!("{kind}:{id}"))));
                        continue;
                    }
                    self.docs.insert(id.clone(), doc);
                    info!(kind, %id, size = self.docs.len(), "Inserted");
                    let _ = respond_to.send(Ok(()));
                }
                StoreRequest::FindOne { filter, respond_to } => {
                    let found = self.docs.values().find(|d| d.matches(&filter)).cloned();
                    debug!(kind, ?filter, found = found.is_some(), "FindOne");
                    let _ = respond_to.send(Ok(found));
                }
                StoreRequest::Find {
                    filter,
                    page,
                    respond_to,
                } => {
                    let matching: Vec<&T> = self.docs.values().filter(|d| d.matches(&filter)).collect();
                    let total = matching.len() as u64;
                    let items: Vec<T> = matching
                        .into_iter()
                        .skip(page.skip())
                        .take(page.limit as usize)
                        .cloned()
                        .collect();
                    debug!(kind, ?filter, ?page, total, returned = items.len(), "Find");
                    let _ = respond_to.send(Ok((items, total)));
                }
                StoreRequest::UpdateOne {
                    filter,
                    patch,
                    respond_to,
                } => {
                    debug!(kind, ?filter, ?patch, "UpdateOne");
                    let updated = self.docs.values_mut().find(|d| d.matches(&filter)).map(|doc| {
                        doc.apply(patch);
                        doc.clone()
                    });
                    match &updated {
                        Some(doc) => info!(kind, id = %doc.id(), "Updated"),
                        None => debug!(kind, "UpdateOne matched nothing"),
                    }
                    let _ = respond_to.send(Ok(updated));
                }
                StoreRequest::UpsertOne {
                    filter,
                    patch,
                    seed,
                    respond_to,
                } => {
                    let result = self.upsert(filter, patch, seed);
                    let _ = respond_to.send(result);
                }
                StoreRequest::DeleteOne { filter, respond_to } => {
                    let id = self
                        .docs
                        .values()
                        .find(|d| d.matches(&filter))
                        .map(|d| d.id().clone());
                    let removed = id.and_then(|id| self.docs.remove(&id));
                    match &removed {
                        Some(doc) => info!(kind, id = %doc.id(), size = self.docs.len(), "Deleted"),
                        None => debug!(kind, ?filter, "DeleteOne matched nothing"),
                    }
                    let _ = respond_to.send(Ok(removed));
                }
            }
        }

        info!(kind, size = self.docs.len(), "Store shutdown");
    }

    fn upsert(&mut self, filter: T::Filter, patch: T::Patch, seed: T) -> Result<T, StoreError> {
        if let Some(doc) = self.docs.values_mut().find(|d| d.matches(&filter)) {
            doc.apply(patch);
            return Ok(doc.clone());
        }

        let id = seed.id().clone();
        if self.docs.contains_key(&id) {
            warn!(kind = T::KIND, %id, "Upsert seed collides with a non-matching document");
            return Err(StoreError::DuplicateKey(format!("{}:{id}", T::KIND)));
        }

        let mut doc = seed;
        doc.apply(patch);
        self.docs.insert(id.clone(), doc.clone());
        info!(kind = T::KIND, %id, "Upserted");
        Ok(doc)
    }
}
