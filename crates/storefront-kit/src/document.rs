//! # Document Trait
//!
//! The `Document` trait is the contract every resource (User, Product, Order,
//! Counter) implements to be kept in a [`StoreActor`](crate::StoreActor). It
//! names the id type, the field filter used for lookups and guarded writes,
//! and the partial-update patch.
//!
//! # Architecture Note
//! The store never interprets a filter or a patch itself. It asks the
//! document (`matches`, `apply`), so one actor loop serves every collection
//! and a `ProductPatch` can't be sent to the order collection.

use std::fmt::{Debug, Display};

/// A resource persisted in the store of record.
pub trait Document: Clone + Send + Sync + Debug + 'static {
    /// Primary key. `Ord` so listings come back in a stable order.
    type Id: Ord + Clone + Send + Sync + Display + Debug;

    /// Field filter (all set fields must match).
    type Filter: Send + Sync + Debug;

    /// Partial update applied to a matching document.
    type Patch: Send + Sync + Debug;

    /// Resource kind, e.g. `"order"`. Used for counters, cache keys and logs.
    const KIND: &'static str;

    fn id(&self) -> &Self::Id;

    /// The filter selecting exactly the document with this id.
    fn by_id(id: Self::Id) -> Self::Filter;

    fn matches(&self, filter: &Self::Filter) -> bool;

    fn apply(&mut self, patch: Self::Patch);
}

/// 1-indexed pagination window for [`StoreClient::find`](crate::StoreClient::find).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub limit: u64,
}

impl Page {
    pub fn new(page: u64, limit: u64) -> Self {
        Self { page, limit }
    }

    /// Every match in one page.
    pub fn all() -> Self {
        Self {
            page: 1,
            limit: u64::MAX,
        }
    }

    pub fn skip(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.limit) as usize
    }
}
