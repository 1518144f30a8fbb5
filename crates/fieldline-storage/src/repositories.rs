// Repository layer for database operations
//
// All SQL for the sync engine lives here. The engine-facing trait
// implementations (DbChannelRegistry, DbSyncCursorStore, DbEventMirror)
// delegate to this struct.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use fieldline_core::{CalendarEvent, PushChannel};

use crate::models::*;

const EVENT_COLUMNS: &str = "id, title, description, start_at, end_at, is_all_day, location, \
     entity_type, entity_id, assignee_type, assignee_id, calendar_id, provider_event_id, etag, \
     sync_enabled, last_synced_at, created_at, updated_at, created_by";

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // ============================================
    // Calendar events
    // ============================================

    pub async fn insert_event(&self, event: &CalendarEvent) -> Result<CalendarEventRow> {
        let row = sqlx::query_as::<_, CalendarEventRow>(&format!(
            r#"
            INSERT INTO calendar_events
                (id, title, description, start_at, end_at, is_all_day, location,
                 entity_type, entity_id, assignee_type, assignee_id, calendar_id,
                 provider_event_id, etag, sync_enabled, last_synced_at, created_at,
                 updated_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING {EVENT_COLUMNS}
            "#,
        ))
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.start)
        .bind(event.end)
        .bind(event.is_all_day)
        .bind(&event.location)
        .bind(event.entity_type.as_str())
        .bind(&event.entity_id)
        .bind(event.assignee_type.map(|a| a.as_str()))
        .bind(&event.assignee_id)
        .bind(&event.calendar_id)
        .bind(&event.provider_event_id)
        .bind(&event.etag)
        .bind(event.sync_enabled)
        .bind(event.last_synced_at)
        .bind(event.created_at)
        .bind(event.updated_at)
        .bind(event.created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_event(&self, id: Uuid) -> Result<Option<CalendarEventRow>> {
        let row = sqlx::query_as::<_, CalendarEventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM calendar_events WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_events_for_calendar(
        &self,
        calendar_id: &str,
    ) -> Result<Vec<CalendarEventRow>> {
        let rows = sqlx::query_as::<_, CalendarEventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM calendar_events
            WHERE calendar_id = $1
            ORDER BY start_at ASC
            "#,
        ))
        .bind(calendar_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn update_event(
        &self,
        id: Uuid,
        input: UpdateCalendarEvent,
    ) -> Result<Option<CalendarEventRow>> {
        let row = sqlx::query_as::<_, CalendarEventRow>(&format!(
            r#"
            UPDATE calendar_events
            SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                start_at = COALESCE($4, start_at),
                end_at = COALESCE($5, end_at),
                is_all_day = COALESCE($6, is_all_day),
                location = COALESCE($7, location),
                assignee_type = COALESCE($8, assignee_type),
                assignee_id = COALESCE($9, assignee_id),
                sync_enabled = COALESCE($10, sync_enabled),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.start)
        .bind(input.end)
        .bind(input.is_all_day)
        .bind(&input.location)
        .bind(&input.assignee_type)
        .bind(&input.assignee_id)
        .bind(input.sync_enabled)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn delete_event(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM calendar_events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_event_by_provider_id(
        &self,
        calendar_id: &str,
        provider_event_id: &str,
    ) -> Result<Option<CalendarEventRow>> {
        let row = sqlx::query_as::<_, CalendarEventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM calendar_events
            WHERE calendar_id = $1 AND provider_event_id = $2
            "#,
        ))
        .bind(calendar_id)
        .bind(provider_event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Insert-or-update a mirror row for a provider-originated change,
    /// keyed by the local event id.
    pub async fn upsert_remote_event(&self, event: &CalendarEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO calendar_events
                (id, title, description, start_at, end_at, is_all_day, location,
                 entity_type, entity_id, assignee_type, assignee_id, calendar_id,
                 provider_event_id, etag, sync_enabled, last_synced_at, created_at,
                 updated_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                start_at = EXCLUDED.start_at,
                end_at = EXCLUDED.end_at,
                is_all_day = EXCLUDED.is_all_day,
                location = EXCLUDED.location,
                assignee_type = EXCLUDED.assignee_type,
                assignee_id = EXCLUDED.assignee_id,
                etag = EXCLUDED.etag,
                last_synced_at = EXCLUDED.last_synced_at,
                updated_at = NOW()
            "#,
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.start)
        .bind(event.end)
        .bind(event.is_all_day)
        .bind(&event.location)
        .bind(event.entity_type.as_str())
        .bind(&event.entity_id)
        .bind(event.assignee_type.map(|a| a.as_str()))
        .bind(&event.assignee_id)
        .bind(&event.calendar_id)
        .bind(&event.provider_event_id)
        .bind(&event.etag)
        .bind(event.sync_enabled)
        .bind(event.last_synced_at)
        .bind(event.created_at)
        .bind(event.updated_at)
        .bind(event.created_by)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn mark_event_synced(
        &self,
        id: Uuid,
        provider_event_id: &str,
        etag: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE calendar_events
            SET provider_event_id = $2, etag = $3, last_synced_at = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(provider_event_id)
        .bind(etag)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete_event_by_provider_id(
        &self,
        calendar_id: &str,
        provider_event_id: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM calendar_events WHERE calendar_id = $1 AND provider_event_id = $2",
        )
        .bind(calendar_id)
        .bind(provider_event_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ============================================
    // Push channels
    // ============================================

    pub async fn insert_channel(&self, channel: &PushChannel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO push_channels (channel_id, resource_id, calendar_id, expiration)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&channel.channel_id)
        .bind(&channel.resource_id)
        .bind(&channel.calendar_id)
        .bind(channel.expiration)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_active_channel(&self, calendar_id: &str) -> Result<Option<PushChannelRow>> {
        let row = sqlx::query_as::<_, PushChannelRow>(
            r#"
            SELECT channel_id, resource_id, calendar_id, expiration, created_at
            FROM push_channels
            WHERE calendar_id = $1 AND expiration > NOW()
            ORDER BY expiration DESC
            LIMIT 1
            "#,
        )
        .bind(calendar_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn validate_channel(
        &self,
        channel_id: &str,
        resource_id: &str,
    ) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT calendar_id
            FROM push_channels
            WHERE channel_id = $1 AND resource_id = $2
            "#,
        )
        .bind(channel_id)
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(calendar_id,)| calendar_id))
    }

    pub async fn channels_expiring_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<PushChannelRow>> {
        let rows = sqlx::query_as::<_, PushChannelRow>(
            r#"
            SELECT channel_id, resource_id, calendar_id, expiration, created_at
            FROM push_channels
            WHERE expiration < $1
            ORDER BY expiration ASC
            "#,
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Insert the new channel and delete the old one in a single
    /// transaction. Deleting an already-gone old channel affects zero rows
    /// and is not an error, which makes overlapping renewal runs converge.
    pub async fn replace_channel(
        &self,
        old_channel_id: &str,
        new_channel: &PushChannel,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO push_channels (channel_id, resource_id, calendar_id, expiration)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (channel_id) DO NOTHING
            "#,
        )
        .bind(&new_channel.channel_id)
        .bind(&new_channel.resource_id)
        .bind(&new_channel.calendar_id)
        .bind(new_channel.expiration)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM push_channels WHERE channel_id = $1")
            .bind(old_channel_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Channels past expiration whose calendar has no live successor.
    /// These calendars have silently stopped receiving webhooks.
    pub async fn channels_expired_without_successor(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<PushChannelRow>> {
        let rows = sqlx::query_as::<_, PushChannelRow>(
            r#"
            SELECT c.channel_id, c.resource_id, c.calendar_id, c.expiration, c.created_at
            FROM push_channels c
            WHERE c.expiration <= $1
              AND NOT EXISTS (
                  SELECT 1 FROM push_channels s
                  WHERE s.calendar_id = c.calendar_id AND s.expiration > $1
              )
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ============================================
    // Sync cursors
    // ============================================

    pub async fn get_cursor(&self, calendar_id: &str) -> Result<Option<SyncCursorRow>> {
        let row = sqlx::query_as::<_, SyncCursorRow>(
            r#"
            SELECT calendar_id, next_sync_token, last_sync_time
            FROM sync_cursors
            WHERE calendar_id = $1
            "#,
        )
        .bind(calendar_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Last-writer-wins by recency: the upsert only lands when the stored
    /// `last_sync_time` is older than the incoming one. Returns false for a
    /// stale (no-op) advance.
    pub async fn advance_cursor(
        &self,
        calendar_id: &str,
        token: &str,
        time: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO sync_cursors (calendar_id, next_sync_token, last_sync_time)
            VALUES ($1, $2, $3)
            ON CONFLICT (calendar_id) DO UPDATE
            SET next_sync_token = EXCLUDED.next_sync_token,
                last_sync_time = EXCLUDED.last_sync_time
            WHERE sync_cursors.last_sync_time < EXCLUDED.last_sync_time
            "#,
        )
        .bind(calendar_id)
        .bind(token)
        .bind(time)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn invalidate_cursor(&self, calendar_id: &str) -> Result<()> {
        sqlx::query("UPDATE sync_cursors SET next_sync_token = NULL WHERE calendar_id = $1")
            .bind(calendar_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ============================================
    // Calendar assignments
    // ============================================

    pub async fn insert_assignment(
        &self,
        assignment: &fieldline_core::CalendarAssignment,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO calendar_assignments
                (id, entity_type, entity_id, assignee_id, calendar_id,
                 provider_event_id, etag, start_date, end_date, rate_per_hour)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(assignment.entity_type.as_str())
        .bind(&assignment.entity_id)
        .bind(&assignment.assignee_id)
        .bind(&assignment.calendar_id)
        .bind(&assignment.provider_event_id)
        .bind(&assignment.etag)
        .bind(assignment.start_date)
        .bind(assignment.end_date)
        .bind(assignment.rate_per_hour)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Assignments for an entity overlapping the inclusive date range
    pub async fn assignments_overlapping(
        &self,
        entity_type: &str,
        entity_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CalendarAssignmentRow>> {
        let rows = sqlx::query_as::<_, CalendarAssignmentRow>(
            r#"
            SELECT id, entity_type, entity_id, assignee_id, calendar_id,
                   provider_event_id, etag, start_date, end_date, rate_per_hour
            FROM calendar_assignments
            WHERE entity_type = $1 AND entity_id = $2
              AND start_date <= $4
              AND (end_date IS NULL OR end_date >= $3)
            ORDER BY start_date ASC
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ============================================
    // Calendar scopes and access
    // ============================================

    pub async fn get_scope(&self, calendar_id: &str) -> Result<Option<CalendarScopeRow>> {
        let row = sqlx::query_as::<_, CalendarScopeRow>(
            "SELECT calendar_id, scope_kind, scope_id FROM calendar_scopes WHERE calendar_id = $1",
        )
        .bind(calendar_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn set_scope(&self, scope: &fieldline_core::CalendarScope) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO calendar_scopes (calendar_id, scope_kind, scope_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (calendar_id) DO UPDATE
            SET scope_kind = EXCLUDED.scope_kind, scope_id = EXCLUDED.scope_id
            "#,
        )
        .bind(&scope.calendar_id)
        .bind(scope.scope_kind.as_str())
        .bind(scope.scope_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn access_level(
        &self,
        calendar_id: &str,
        employee_id: Uuid,
    ) -> Result<Option<CalendarAccessRow>> {
        let row = sqlx::query_as::<_, CalendarAccessRow>(
            r#"
            SELECT calendar_id, employee_id, level
            FROM calendar_access
            WHERE calendar_id = $1 AND employee_id = $2
            "#,
        )
        .bind(calendar_id)
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn grant_access(&self, access: &fieldline_core::CalendarAccess) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO calendar_access (calendar_id, employee_id, level)
            VALUES ($1, $2, $3)
            ON CONFLICT (calendar_id, employee_id) DO UPDATE
            SET level = EXCLUDED.level
            "#,
        )
        .bind(&access.calendar_id)
        .bind(access.employee_id)
        .bind(access.level.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
