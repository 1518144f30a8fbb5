// Calendar provider client trait
//
// The adapter boundary of the engine: everything the sync engine needs from
// an external calendar provider, expressed in provider-agnostic types. No
// provider wire type leaks past this trait, which is what makes a fake
// client sufficient to test every other component.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::AdapterError;
use crate::event::{CalendarEvent, EntityType};

/// Provider-issued identity and version of a pushed event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventVersion {
    pub provider_event_id: String,
    pub etag: String,
}

/// One changed event as reported by the provider.
///
/// `entity` is recovered from the private metadata we attach on push; it is
/// None for events created directly on the provider by a human.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEvent {
    pub provider_event_id: String,
    pub etag: String,
    pub title: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub is_all_day: bool,
    pub location: Option<String>,
    pub entity: Option<(EntityType, String)>,
    /// True when the provider reports the event as deleted
    pub cancelled: bool,
}

/// Result of an incremental (or full) changes pull
#[derive(Debug, Clone)]
pub struct ChangeSet {
    pub changes: Vec<ProviderEvent>,
    /// Token to pass to the next incremental pull
    pub next_sync_token: String,
}

/// Result of registering a push channel with the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchResult {
    pub resource_id: String,
    pub expiration: DateTime<Utc>,
}

/// Provider-agnostic calendar operations.
///
/// All operations are network calls. Implementations must absorb transient
/// failures (timeout, 5xx, rate limit) with bounded backoff retries and
/// carry a bounded timeout on every request; a timed-out call is retryable,
/// never permanent.
#[async_trait]
pub trait CalendarClient: Send + Sync {
    /// Create an event on the provider. Returns the provider id and etag.
    async fn create_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> Result<EventVersion, AdapterError>;

    /// Update an event on the provider.
    ///
    /// Requires `event.provider_event_id` and `event.etag`; fails with
    /// `AdapterError::Conflict` if the provider's stored etag has changed.
    async fn update_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> Result<EventVersion, AdapterError>;

    /// Delete an event on the provider.
    async fn delete_event(
        &self,
        calendar_id: &str,
        provider_event_id: &str,
    ) -> Result<(), AdapterError>;

    /// List events changed since `sync_token`.
    ///
    /// A None token performs a full resync: every event currently on the
    /// calendar is returned along with a fresh token.
    async fn list_changes_since(
        &self,
        calendar_id: &str,
        sync_token: Option<&str>,
    ) -> Result<ChangeSet, AdapterError>;

    /// Register a push-notification channel for a calendar.
    async fn watch(
        &self,
        calendar_id: &str,
        channel_id: &str,
        webhook_url: &str,
        ttl: Duration,
    ) -> Result<WatchResult, AdapterError>;

    /// Stop a push-notification channel.
    async fn stop_watch(&self, channel_id: &str, resource_id: &str) -> Result<(), AdapterError>;
}
