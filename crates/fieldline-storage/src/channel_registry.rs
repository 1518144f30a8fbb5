// Database-backed ChannelRegistry implementation
//
// This module implements the core ChannelRegistry trait over the
// push_channels table. It is the source of truth consulted when inbound
// webhooks are validated.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldline_core::{traits::ChannelRegistry, PushChannel, Result, SyncError};

use crate::repositories::Database;

// ============================================================================
// DbChannelRegistry
// ============================================================================

/// Database-backed channel registry
#[derive(Clone)]
pub struct DbChannelRegistry {
    db: Database,
}

impl DbChannelRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChannelRegistry for DbChannelRegistry {
    async fn register(&self, channel: &PushChannel) -> Result<()> {
        self.db
            .insert_channel(channel)
            .await
            .map_err(|e| SyncError::storage(e.to_string()))
    }

    async fn find_active(&self, calendar_id: &str) -> Result<Option<PushChannel>> {
        let row = self
            .db
            .find_active_channel(calendar_id)
            .await
            .map_err(|e| SyncError::storage(e.to_string()))?;

        Ok(row.map(PushChannel::from))
    }

    async fn validate(&self, channel_id: &str, resource_id: &str) -> Result<Option<String>> {
        self.db
            .validate_channel(channel_id, resource_id)
            .await
            .map_err(|e| SyncError::storage(e.to_string()))
    }

    async fn expiring_before(&self, threshold: DateTime<Utc>) -> Result<Vec<PushChannel>> {
        let rows = self
            .db
            .channels_expiring_before(threshold)
            .await
            .map_err(|e| SyncError::storage(e.to_string()))?;

        Ok(rows.into_iter().map(PushChannel::from).collect())
    }

    async fn replace(&self, old: &PushChannel, new: &PushChannel) -> Result<()> {
        self.db
            .replace_channel(&old.channel_id, new)
            .await
            .map_err(|e| SyncError::storage(e.to_string()))
    }

    async fn expired_without_successor(&self, now: DateTime<Utc>) -> Result<Vec<PushChannel>> {
        let rows = self
            .db
            .channels_expired_without_successor(now)
            .await
            .map_err(|e| SyncError::storage(e.to_string()))?;

        Ok(rows.into_iter().map(PushChannel::from).collect())
    }
}

/// Create a database-backed channel registry
pub fn create_db_channel_registry(db: Database) -> DbChannelRegistry {
    DbChannelRegistry::new(db)
}
