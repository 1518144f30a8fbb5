// Database-backed EventMirror implementation
//
// The narrow slice of calendar_events persistence the sync engine needs:
// lookups by provider id, remote upserts, remote deletions, and recording
// successful pushes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldline_core::{traits::EventMirror, CalendarEvent, EventVersion, Result, SyncError};
use uuid::Uuid;

use crate::repositories::Database;

/// Database-backed calendar event mirror
#[derive(Clone)]
pub struct DbEventMirror {
    db: Database,
}

impl DbEventMirror {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EventMirror for DbEventMirror {
    async fn find_by_provider_event_id(
        &self,
        calendar_id: &str,
        provider_event_id: &str,
    ) -> Result<Option<CalendarEvent>> {
        let row = self
            .db
            .find_event_by_provider_id(calendar_id, provider_event_id)
            .await
            .map_err(|e| SyncError::storage(e.to_string()))?;

        row.map(CalendarEvent::try_from)
            .transpose()
            .map_err(|e| SyncError::storage(e.to_string()))
    }

    async fn upsert_remote(&self, event: &CalendarEvent) -> Result<()> {
        self.db
            .upsert_remote_event(event)
            .await
            .map_err(|e| SyncError::storage(e.to_string()))
    }

    async fn remove_by_provider_event_id(
        &self,
        calendar_id: &str,
        provider_event_id: &str,
    ) -> Result<bool> {
        self.db
            .delete_event_by_provider_id(calendar_id, provider_event_id)
            .await
            .map_err(|e| SyncError::storage(e.to_string()))
    }

    async fn mark_synced(&self, id: Uuid, version: &EventVersion, at: DateTime<Utc>) -> Result<()> {
        self.db
            .mark_event_synced(id, &version.provider_event_id, &version.etag, at)
            .await
            .map_err(|e| SyncError::storage(e.to_string()))
    }
}

/// Create a database-backed event mirror
pub fn create_db_event_mirror(db: Database) -> DbEventMirror {
    DbEventMirror::new(db)
}
