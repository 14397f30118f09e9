//! # Store Client
//!
//! The handle usecases hold to talk to the store of record.

use crate::document::{Document, Page};
use crate::error::StoreError;
use crate::message::StoreRequest;
use tokio::sync::{mpsc, oneshot};

/// A type-safe client for one collection of the store of record.
///
/// Cloning is cheap (it only holds a sender). If the actor behind it has
/// stopped, every call fails with [`StoreError::Unavailable`].
pub struct StoreClient<T: Document> {
    sender: mpsc::Sender<StoreRequest<T>>,
}

impl<T: Document> Clone for StoreClient<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T: Document> StoreClient<T> {
    pub fn new(sender: mpsc::Sender<StoreRequest<T>>) -> Self {
        Self { sender }
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<R, StoreError>>) -> StoreRequest<T>,
    ) -> Result<R, StoreError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| StoreError::Unavailable)?;
        response.await.map_err(|_| StoreError::Dropped)?
    }

    pub async fn insert(&self, doc: T) -> Result<(), StoreError> {
        self.request(|respond_to| StoreRequest::Insert { doc, respond_to })
            .await
    }

    /// Point lookup by primary key.
    pub async fn get(&self, id: T::Id) -> Result<Option<T>, StoreError> {
        self.find_one(T::by_id(id)).await
    }

    pub async fn find_one(&self, filter: T::Filter) -> Result<Option<T>, StoreError> {
        self.request(|respond_to| StoreRequest::FindOne { filter, respond_to })
            .await
    }

    /// Filtered listing. Returns the requested page and the total match count.
    pub async fn find(&self, filter: T::Filter, page: Page) -> Result<(Vec<T>, u64), StoreError> {
        self.request(|respond_to| StoreRequest::Find {
            filter,
            page,
            respond_to,
        })
        .await
    }

    /// Applies `patch` to the first document matching `filter`.
    ///
    /// Returns `None` when nothing matched. Putting the expected current value
    /// of a field into `filter` turns this into a compare-and-swap.
    pub async fn update_one(&self, filter: T::Filter, patch: T::Patch) -> Result<Option<T>, StoreError> {
        self.request(|respond_to| StoreRequest::UpdateOne {
            filter,
            patch,
            respond_to,
        })
        .await
    }

    /// Applies `patch` to the first match, or inserts `seed` with `patch`
    /// applied when nothing matches. One atomic step either way.
    pub async fn upsert_one(&self, filter: T::Filter, patch: T::Patch, seed: T) -> Result<T, StoreError> {
        self.request(|respond_to| StoreRequest::UpsertOne {
            filter,
            patch,
            seed,
            respond_to,
        })
        .await
    }

    pub async fn delete_one(&self, filter: T::Filter) -> Result<Option<T>, StoreError> {
        self.request(|respond_to| StoreRequest::DeleteOne { filter, respond_to })
            .await
    }
}
