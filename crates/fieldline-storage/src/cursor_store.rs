// Database-backed SyncCursorStore implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldline_core::{traits::SyncCursorStore, Result, SyncCursor, SyncError};

use crate::repositories::Database;

/// Database-backed sync cursor store
#[derive(Clone)]
pub struct DbSyncCursorStore {
    db: Database,
}

impl DbSyncCursorStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SyncCursorStore for DbSyncCursorStore {
    async fn get(&self, calendar_id: &str) -> Result<Option<SyncCursor>> {
        let row = self
            .db
            .get_cursor(calendar_id)
            .await
            .map_err(|e| SyncError::storage(e.to_string()))?;

        Ok(row.map(SyncCursor::from))
    }

    async fn advance(&self, calendar_id: &str, token: &str, time: DateTime<Utc>) -> Result<bool> {
        self.db
            .advance_cursor(calendar_id, token, time)
            .await
            .map_err(|e| SyncError::storage(e.to_string()))
    }

    async fn invalidate(&self, calendar_id: &str) -> Result<()> {
        self.db
            .invalidate_cursor(calendar_id)
            .await
            .map_err(|e| SyncError::storage(e.to_string()))
    }
}

/// Create a database-backed sync cursor store
pub fn create_db_cursor_store(db: Database) -> DbSyncCursorStore {
    DbSyncCursorStore::new(db)
}
