// Core traits for pluggable durable stores
//
// These traits allow the sync engine to be used with different backends:
// - In-memory implementations for examples and testing (see `memory`)
// - Database implementations for production (fieldline-storage)
//
// All cross-request coordination in the engine goes through these stores;
// the atomicity requirements on `advance` and `replace` are what make
// concurrent webhook deliveries and overlapping renewal runs safe.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::channel::{PushChannel, SyncCursor};
use crate::client::EventVersion;
use crate::error::Result;
use crate::event::CalendarEvent;

// ============================================================================
// ChannelRegistry - Source of truth for push-notification channels
// ============================================================================

/// Persistent registry of push-notification channels.
///
/// `validate` is the security boundary for inbound webhooks: a channel/
/// resource pair not found here must be acknowledged but never acted on.
#[async_trait]
pub trait ChannelRegistry: Send + Sync {
    /// Persist a freshly-watched channel
    async fn register(&self, channel: &PushChannel) -> Result<()>;

    /// Newest non-expired channel for a calendar, if any
    async fn find_active(&self, calendar_id: &str) -> Result<Option<PushChannel>>;

    /// Resolve a webhook's channel/resource pair to its calendar id
    async fn validate(&self, channel_id: &str, resource_id: &str) -> Result<Option<String>>;

    /// Channels expiring before the threshold (renewal candidates)
    async fn expiring_before(&self, threshold: DateTime<Utc>) -> Result<Vec<PushChannel>>;

    /// Atomically insert `new` and delete `old` in one transaction.
    ///
    /// Idempotent when `old` is already gone, so overlapping renewal runs
    /// converge on exactly one active channel per calendar.
    async fn replace(&self, old: &PushChannel, new: &PushChannel) -> Result<()>;

    /// Channels already past expiration with no successor for their
    /// calendar. A non-empty result means webhooks have silently stopped
    /// for those calendars; surfaced for operator attention.
    async fn expired_without_successor(&self, now: DateTime<Utc>) -> Result<Vec<PushChannel>>;
}

// ============================================================================
// SyncCursorStore - Incremental sync position per calendar
// ============================================================================

/// Persistent incremental-sync cursors.
#[async_trait]
pub trait SyncCursorStore: Send + Sync {
    /// Current cursor for a calendar, if one exists
    async fn get(&self, calendar_id: &str) -> Result<Option<SyncCursor>>;

    /// Advance the cursor, last-writer-wins by recency.
    ///
    /// The write only lands if the stored `last_sync_time` is older than
    /// `time`; a stale advance is a no-op and returns false. Only call this
    /// after every change in the pulled batch has been durably applied.
    async fn advance(&self, calendar_id: &str, token: &str, time: DateTime<Utc>) -> Result<bool>;

    /// Clear the token, forcing a full resync on the next pull
    async fn invalidate(&self, calendar_id: &str) -> Result<()>;
}

// ============================================================================
// EventMirror - Local mirror of calendar events
// ============================================================================

/// Persistence for the local calendar-event mirror, as needed by pull sync
/// and outbound push. Full CRUD lives in the storage crate; this trait is
/// the narrow slice the engine itself requires.
#[async_trait]
pub trait EventMirror: Send + Sync {
    /// Look up a mirrored event by its provider-side id
    async fn find_by_provider_event_id(
        &self,
        calendar_id: &str,
        provider_event_id: &str,
    ) -> Result<Option<CalendarEvent>>;

    /// Insert or update a mirror row for a provider-originated change
    async fn upsert_remote(&self, event: &CalendarEvent) -> Result<()>;

    /// Remove the mirror row for a provider-side deletion.
    /// Returns false if no row matched (already gone).
    async fn remove_by_provider_event_id(
        &self,
        calendar_id: &str,
        provider_event_id: &str,
    ) -> Result<bool>;

    /// Record a successful outbound push
    async fn mark_synced(
        &self,
        id: Uuid,
        version: &EventVersion,
        at: DateTime<Utc>,
    ) -> Result<()>;
}
