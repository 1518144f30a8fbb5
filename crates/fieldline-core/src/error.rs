// Error types for the calendar sync engine

use thiserror::Error;

use crate::event::EntityType;

/// Result type alias for sync engine operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors surfaced by the provider adapter.
///
/// Retryable failures are retried with backoff inside the adapter; callers
/// only ever observe the final outcome after the attempt budget is spent.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Transient provider failure (timeout, 5xx, rate limit)
    #[error("retryable provider failure: {0}")]
    Retryable(String),

    /// Event or calendar missing on the provider side (404/410)
    #[error("provider resource not found: {0}")]
    NotFound(String),

    /// The stored sync token is no longer accepted by the provider.
    /// Callers must invalidate the cursor and fall back to a full resync.
    #[error("sync token no longer valid")]
    InvalidSyncToken,

    /// Etag mismatch on update (optimistic concurrency)
    #[error("etag conflict on provider event {provider_event_id}")]
    Conflict { provider_event_id: String },

    /// Any other non-retryable provider rejection
    #[error("permanent provider failure: {0}")]
    Permanent(String),
}

impl AdapterError {
    /// Create a retryable error
    pub fn retryable(msg: impl Into<String>) -> Self {
        AdapterError::Retryable(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        AdapterError::NotFound(msg.into())
    }

    /// Create a permanent error
    pub fn permanent(msg: impl Into<String>) -> Self {
        AdapterError::Permanent(msg.into())
    }

    /// Whether the operation may be attempted again
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdapterError::Retryable(_))
    }

    /// Whether the provider reports the resource as already gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, AdapterError::NotFound(_))
    }
}

/// Errors that can occur in the sync engine
#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed request rejected at the boundary (e.g. missing webhook headers)
    #[error("validation error: {0}")]
    Validation(String),

    /// Webhook channel/resource pair not present in the registry.
    /// Acknowledged to the provider, never acted on.
    #[error("unrecognized channel {channel_id} (resource {resource_id})")]
    NotRecognized {
        channel_id: String,
        resource_id: String,
    },

    /// Inbound application is not defined for this entity type
    #[error("entity type {0} is push-only and cannot accept provider changes")]
    InboundNotSupported(EntityType),

    /// Provider adapter error after retries
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// Storage layer error
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SyncError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        SyncError::Validation(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        SyncError::Storage(msg.into())
    }

    /// Create a not-recognized error for a webhook channel pair
    pub fn not_recognized(channel_id: impl Into<String>, resource_id: impl Into<String>) -> Self {
        SyncError::NotRecognized {
            channel_id: channel_id.into(),
            resource_id: resource_id.into(),
        }
    }
}
