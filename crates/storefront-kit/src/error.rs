//! # Error Taxonomy
//!
//! Every usecase operation returns [`ServiceError`]. The lower-level errors
//! ([`StoreError`], [`CacheError`], [`TransportError`], [`PublishError`]) belong
//! to the collaborators and are wrapped as they cross into a usecase.
//!
//! | Kind | Surfaced as | Retried |
//! |------|-------------|---------|
//! | `Validation` | client error | never |
//! | `NotFound` | client error (404-like) | never |
//! | `InvalidTransition` | client error | never |
//! | `AllocationFailed` | server error | never |
//! | `Store` | server error | never |
//! | `Publish` | logged only | never |
//!
//! `Publish` exists so that publishers have something to return; usecases
//! send events through [`SideChannel`](crate::events::SideChannel), which
//! swallows it after logging.

/// Failures of the store of record.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable")]
    Unavailable,
    #[error("store dropped response channel")]
    Dropped,
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("conflicting concurrent update on {0}")]
    Conflict(String),
}

/// Failures of the cache backend. Never reach a caller of a read.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures of the messaging transport.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("transport error: {0}")]
    Other(String),
}

/// Failures while publishing a domain event.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("event transport error: {0}")]
    Transport(#[from] TransportError),
}

/// The error kinds a usecase operation can return.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("identifier allocation failed for {resource_type}: {source}")]
    AllocationFailed {
        resource_type: String,
        #[source]
        source: StoreError,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        ServiceError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        ServiceError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// True for the kinds caused by the request itself (4xx-equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServiceError::Validation(_)
                | ServiceError::NotFound { .. }
                | ServiceError::InvalidTransition { .. }
        )
    }
}
