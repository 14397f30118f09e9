//! # Identifier Allocation
//!
//! Ids for new resources come from one counter row per resource type in the
//! store of record. The row is bumped with a single find-and-increment-or-
//! create request, so concurrent writers (in this process or any other
//! process sharing the store) can never observe the same value twice.
//!
//! There is no in-process counter and no fallback: when the store
//! can't perform the increment the caller gets
//! [`ServiceError::AllocationFailed`] and must not write anything.

use crate::client::StoreClient;
use crate::document::Document;
use crate::error::{ServiceError, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// One counter row: `{resource_type, value}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub resource_type: String,
    pub value: u64,
}

/// The only mutation a counter accepts.
#[derive(Debug, Clone, Copy)]
pub struct Increment(pub u64);

impl Document for Counter {
    type Id = String;
    type Filter = String;
    type Patch = Increment;

    const KIND: &'static str = "counter";

    fn id(&self) -> &String {
        &self.resource_type
    }

    fn by_id(id: String) -> String {
        id
    }

    fn matches(&self, filter: &String) -> bool {
        &self.resource_type == filter
    }

    fn apply(&mut self, patch: Increment) {
        self.value = self.value.saturating_add(patch.0);
    }
}

/// The narrow store primitive the allocator depends on.
///
/// Implementations must perform the read, increment and (if needed) create
/// as one indivisible step and return the post-increment value.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn find_and_increment(&self, key: &str) -> Result<u64, StoreError>;
}

#[async_trait]
impl CounterStore for StoreClient<Counter> {
    async fn find_and_increment(&self, key: &str) -> Result<u64, StoreError> {
        let seed = Counter {
            resource_type: key.to_string(),
            value: 0,
        };
        let row = self
            .upsert_one(key.to_string(), Increment(1), seed)
            .await?;
        Ok(row.value)
    }
}

/// Issues strictly increasing, never reused ids per resource type.
#[derive(Clone)]
pub struct IdentifierAllocator {
    counters: Arc<dyn CounterStore>,
}

impl IdentifierAllocator {
    pub fn new(counters: Arc<dyn CounterStore>) -> Self {
        Self { counters }
    }

    #[instrument(skip(self))]
    pub async fn next(&self, resource_type: &str) -> Result<u64, ServiceError> {
        match self.counters.find_and_increment(resource_type).await {
            Ok(id) => {
                debug!(resource_type, id, "Allocated id");
                Ok(id)
            }
            Err(source) => {
                error!(resource_type, error = %source, "Id allocation failed");
                Err(ServiceError::AllocationFailed {
                    resource_type: resource_type.to_string(),
                    source,
                })
            }
        }
    }
}
