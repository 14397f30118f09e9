//! # Store Messages
//!
//! The requests a [`StoreClient`](crate::StoreClient) sends to a
//! [`StoreActor`](crate::StoreActor), one variant per store operation.

use crate::document::{Document, Page};
use crate::error::StoreError;
use tokio::sync::oneshot;

/// Type alias for the one-shot response channel used by the store.
pub type Response<T> = oneshot::Sender<Result<T, StoreError>>;

/// A request to the store of record for one collection.
///
/// Every variant is handled to completion before the next message is read,
/// which makes each of them a single atomic step. `UpdateOne` with a filter
/// on the current value is how callers get compare-and-swap, and `UpsertOne`
/// is the find-and-increment-or-create primitive counters rely on.
#[derive(Debug)]
pub enum StoreRequest<T: Document> {
    Insert {
        doc: T,
        respond_to: Response<()>,
    },
    FindOne {
        filter: T::Filter,
        respond_to: Response<Option<T>>,
    },
    Find {
        filter: T::Filter,
        page: Page,
        respond_to: Response<(Vec<T>, u64)>,
    },
    UpdateOne {
        filter: T::Filter,
        patch: T::Patch,
        respond_to: Response<Option<T>>,
    },
    UpsertOne {
        filter: T::Filter,
        patch: T::Patch,
        seed: T,
        respond_to: Response<T>,
    },
    DeleteOne {
        filter: T::Filter,
        respond_to: Response<Option<T>>,
    },
}
