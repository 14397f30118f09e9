//! # Storefront Kit
//!
//! The consistency plumbing shared by the storefront services: the pieces
//! that have real concurrency and consistency tradeoffs, kept apart from the
//! per-resource CRUD that sits on top of them.
//!
//! ## Building Blocks
//!
//! | Component | Role |
//! |-----------|------|
//! | [`StoreActor`] / [`StoreClient`] | In-memory store of record, one actor per collection |
//! | [`IdentifierAllocator`] | Collision-free ids from an atomic counter row per resource type |
//! | [`ReadThroughCache`] | Cache-aside reads with a TTL bound on staleness |
//! | [`SideChannel`] / [`EventConsumer`] | Best-effort events between services |
//! | [`ServiceError`] | The error kinds every usecase returns |
//!
//! ## Why Actors for the Store?
//!
//! Each [`StoreActor`] owns its collection and processes requests one at a
//! time. That gives every single request (an upsert-increment, a guarded
//! update) the same atomicity a document store gives a single-document
//! operation, without any locks in the calling code. Sequences of requests
//! are *not* atomic; callers that need read-validate-write put the
//! validated value into the write's filter and retry when it doesn't match.
//!
//! ## Lifecycle
//!
//! 1. **Creation**: `StoreActor::new(buffer)` returns the actor and its client.
//! 2. **Running**: `tokio::spawn(actor.run())`.
//! 3. **Shutdown**: the loop exits once every [`StoreClient`] clone is dropped.
//!    Any request already queued is answered first.
//!
//! ```rust
//! use std::sync::Arc;
//! use storefront_kit::{Counter, IdentifierAllocator, StoreActor};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (actor, counters) = StoreActor::<Counter>::new(32);
//!     let handle = tokio::spawn(actor.run());
//!
//!     let ids = IdentifierAllocator::new(Arc::new(counters));
//!     assert_eq!(ids.next("order").await.unwrap(), 1);
//!     assert_eq!(ids.next("order").await.unwrap(), 2);
//!
//!     drop(ids);
//!     handle.await.unwrap();
//! }
//! ```
//!
//! ## Testing
//!
//! See [`mock`] for channel-level store mocks and failing collaborators.

pub mod actor;
pub mod allocator;
pub mod cache;
pub mod client;
pub mod document;
pub mod error;
pub mod events;
pub mod message;
pub mod mock;

pub use actor::StoreActor;
pub use allocator::{Counter, CounterStore, IdentifierAllocator, Increment};
pub use cache::{CacheBackend, CacheKey, MemoryCache, ReadThroughCache, DEFAULT_CACHE_TTL};
pub use client::StoreClient;
pub use document::{Document, Page};
pub use error::{CacheError, PublishError, ServiceError, StoreError, TransportError};
pub use events::{
    DomainEvent, EventConsumer, EventHandler, EventKind, EventPublisher, MemoryBroker,
    MessageTransport, SideChannel, Subscription, TransportPublisher,
};
pub use message::StoreRequest;
