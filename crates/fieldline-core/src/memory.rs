// In-memory implementations for examples and testing
//
// These implementations keep all data in memory, making them perfect for:
// - Unit tests of the sync engine and webhook handler
// - Standalone examples that don't need a database
//
// They honor the same atomicity contracts as the database-backed stores:
// last-writer-wins cursor advancement and idempotent channel replacement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::channel::{PushChannel, SyncCursor};
use crate::client::EventVersion;
use crate::error::Result;
use crate::event::CalendarEvent;
use crate::traits::{ChannelRegistry, EventMirror, SyncCursorStore};

// ============================================================================
// InMemoryChannelRegistry
// ============================================================================

/// In-memory channel registry keyed by channel id
#[derive(Debug, Default, Clone)]
pub struct InMemoryChannelRegistry {
    channels: Arc<RwLock<HashMap<String, PushChannel>>>,
}

impl InMemoryChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with channels (useful for testing)
    pub async fn seed(&self, channels: Vec<PushChannel>) {
        let mut map = self.channels.write().await;
        for channel in channels {
            map.insert(channel.channel_id.clone(), channel);
        }
    }

    pub async fn all(&self) -> Vec<PushChannel> {
        self.channels.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl ChannelRegistry for InMemoryChannelRegistry {
    async fn register(&self, channel: &PushChannel) -> Result<()> {
        self.channels
            .write()
            .await
            .insert(channel.channel_id.clone(), channel.clone());
        Ok(())
    }

    async fn find_active(&self, calendar_id: &str) -> Result<Option<PushChannel>> {
        let now = Utc::now();
        Ok(self
            .channels
            .read()
            .await
            .values()
            .filter(|c| c.calendar_id == calendar_id && !c.is_expired(now))
            .max_by_key(|c| c.expiration)
            .cloned())
    }

    async fn validate(&self, channel_id: &str, resource_id: &str) -> Result<Option<String>> {
        Ok(self
            .channels
            .read()
            .await
            .get(channel_id)
            .filter(|c| c.resource_id == resource_id)
            .map(|c| c.calendar_id.clone()))
    }

    async fn expiring_before(&self, threshold: DateTime<Utc>) -> Result<Vec<PushChannel>> {
        Ok(self
            .channels
            .read()
            .await
            .values()
            .filter(|c| c.expiration < threshold)
            .cloned()
            .collect())
    }

    async fn replace(&self, old: &PushChannel, new: &PushChannel) -> Result<()> {
        let mut map = self.channels.write().await;
        map.insert(new.channel_id.clone(), new.clone());
        map.remove(&old.channel_id);
        Ok(())
    }

    async fn expired_without_successor(&self, now: DateTime<Utc>) -> Result<Vec<PushChannel>> {
        let map = self.channels.read().await;
        Ok(map
            .values()
            .filter(|c| {
                c.is_expired(now)
                    && !map
                        .values()
                        .any(|other| other.calendar_id == c.calendar_id && !other.is_expired(now))
            })
            .cloned()
            .collect())
    }
}

// ============================================================================
// InMemorySyncCursorStore
// ============================================================================

/// In-memory sync cursor store keyed by calendar id
#[derive(Debug, Default, Clone)]
pub struct InMemorySyncCursorStore {
    cursors: Arc<RwLock<HashMap<String, SyncCursor>>>,
}

impl InMemorySyncCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, cursor: SyncCursor) {
        self.cursors
            .write()
            .await
            .insert(cursor.calendar_id.clone(), cursor);
    }
}

#[async_trait]
impl SyncCursorStore for InMemorySyncCursorStore {
    async fn get(&self, calendar_id: &str) -> Result<Option<SyncCursor>> {
        Ok(self.cursors.read().await.get(calendar_id).cloned())
    }

    async fn advance(&self, calendar_id: &str, token: &str, time: DateTime<Utc>) -> Result<bool> {
        let mut map = self.cursors.write().await;
        match map.get_mut(calendar_id) {
            Some(cursor) => {
                if cursor.last_sync_time >= time {
                    return Ok(false);
                }
                cursor.next_sync_token = Some(token.to_string());
                cursor.last_sync_time = time;
                Ok(true)
            }
            None => {
                map.insert(
                    calendar_id.to_string(),
                    SyncCursor {
                        calendar_id: calendar_id.to_string(),
                        next_sync_token: Some(token.to_string()),
                        last_sync_time: time,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn invalidate(&self, calendar_id: &str) -> Result<()> {
        if let Some(cursor) = self.cursors.write().await.get_mut(calendar_id) {
            cursor.next_sync_token = None;
        }
        Ok(())
    }
}

// ============================================================================
// InMemoryEventMirror
// ============================================================================

/// In-memory calendar event mirror keyed by local event id
#[derive(Debug, Default, Clone)]
pub struct InMemoryEventMirror {
    events: Arc<RwLock<HashMap<Uuid, CalendarEvent>>>,
}

impl InMemoryEventMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, events: Vec<CalendarEvent>) {
        let mut map = self.events.write().await;
        for event in events {
            map.insert(event.id, event);
        }
    }

    pub async fn all(&self) -> Vec<CalendarEvent> {
        self.events.read().await.values().cloned().collect()
    }

    pub async fn get(&self, id: Uuid) -> Option<CalendarEvent> {
        self.events.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl EventMirror for InMemoryEventMirror {
    async fn find_by_provider_event_id(
        &self,
        calendar_id: &str,
        provider_event_id: &str,
    ) -> Result<Option<CalendarEvent>> {
        Ok(self
            .events
            .read()
            .await
            .values()
            .find(|e| {
                e.calendar_id == calendar_id
                    && e.provider_event_id.as_deref() == Some(provider_event_id)
            })
            .cloned())
    }

    async fn upsert_remote(&self, event: &CalendarEvent) -> Result<()> {
        self.events.write().await.insert(event.id, event.clone());
        Ok(())
    }

    async fn remove_by_provider_event_id(
        &self,
        calendar_id: &str,
        provider_event_id: &str,
    ) -> Result<bool> {
        let mut map = self.events.write().await;
        let id = map
            .values()
            .find(|e| {
                e.calendar_id == calendar_id
                    && e.provider_event_id.as_deref() == Some(provider_event_id)
            })
            .map(|e| e.id);
        Ok(match id {
            Some(id) => map.remove(&id).is_some(),
            None => false,
        })
    }

    async fn mark_synced(&self, id: Uuid, version: &EventVersion, at: DateTime<Utc>) -> Result<()> {
        if let Some(event) = self.events.write().await.get_mut(&id) {
            event.provider_event_id = Some(version.provider_event_id.clone());
            event.etag = Some(version.etag.clone());
            event.last_synced_at = Some(at);
            event.updated_at = at;
        }
        Ok(())
    }
}
