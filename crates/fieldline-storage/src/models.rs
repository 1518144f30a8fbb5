// Database models (internal, may differ from public DTOs)

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use fieldline_core::{
    AccessLevel, AssigneeType, CalendarAccess, CalendarAssignment, CalendarEvent, CalendarScope,
    EntityType, PushChannel, ScopeKind, SyncCursor,
};

// ============================================
// Calendar event models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct CalendarEventRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub is_all_day: bool,
    pub location: Option<String>,
    pub entity_type: String,
    pub entity_id: String,
    pub assignee_type: Option<String>,
    pub assignee_id: Option<String>,
    pub calendar_id: String,
    pub provider_event_id: Option<String>,
    pub etag: Option<String>,
    pub sync_enabled: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl TryFrom<CalendarEventRow> for CalendarEvent {
    type Error = anyhow::Error;

    fn try_from(row: CalendarEventRow) -> Result<Self, Self::Error> {
        let entity_type = EntityType::from_str(&row.entity_type)
            .map_err(|e| anyhow::anyhow!("calendar_events.{}: {e}", row.id))?;
        let assignee_type = row
            .assignee_type
            .as_deref()
            .map(AssigneeType::from_str)
            .transpose()
            .map_err(|e| anyhow::anyhow!("calendar_events.{}: {e}", row.id))?;

        Ok(CalendarEvent {
            id: row.id,
            title: row.title,
            description: row.description,
            start: row.start_at,
            end: row.end_at,
            is_all_day: row.is_all_day,
            location: row.location,
            entity_type,
            entity_id: row.entity_id,
            assignee_type,
            assignee_id: row.assignee_id,
            calendar_id: row.calendar_id,
            provider_event_id: row.provider_event_id,
            etag: row.etag,
            sync_enabled: row.sync_enabled,
            last_synced_at: row.last_synced_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            created_by: row.created_by,
        })
    }
}

/// Partial update for a calendar event. Entity identity is deliberately
/// absent: `entity_type`/`entity_id` are immutable after creation.
#[derive(Debug, Clone, Default)]
pub struct UpdateCalendarEvent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub is_all_day: Option<bool>,
    pub location: Option<String>,
    pub assignee_type: Option<String>,
    pub assignee_id: Option<String>,
    pub sync_enabled: Option<bool>,
}

// ============================================
// Push channel models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct PushChannelRow {
    pub channel_id: String,
    pub resource_id: String,
    pub calendar_id: String,
    pub expiration: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<PushChannelRow> for PushChannel {
    fn from(row: PushChannelRow) -> Self {
        PushChannel {
            channel_id: row.channel_id,
            resource_id: row.resource_id,
            calendar_id: row.calendar_id,
            expiration: row.expiration,
        }
    }
}

// ============================================
// Sync cursor models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct SyncCursorRow {
    pub calendar_id: String,
    pub next_sync_token: Option<String>,
    pub last_sync_time: DateTime<Utc>,
}

impl From<SyncCursorRow> for SyncCursor {
    fn from(row: SyncCursorRow) -> Self {
        SyncCursor {
            calendar_id: row.calendar_id,
            next_sync_token: row.next_sync_token,
            last_sync_time: row.last_sync_time,
        }
    }
}

// ============================================
// Assignment models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct CalendarAssignmentRow {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: String,
    pub assignee_id: String,
    pub calendar_id: String,
    pub provider_event_id: String,
    pub etag: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub rate_per_hour: Option<f64>,
}

impl TryFrom<CalendarAssignmentRow> for CalendarAssignment {
    type Error = anyhow::Error;

    fn try_from(row: CalendarAssignmentRow) -> Result<Self, Self::Error> {
        let entity_type = EntityType::from_str(&row.entity_type)
            .map_err(|e| anyhow::anyhow!("calendar_assignments.{}: {e}", row.id))?;
        Ok(CalendarAssignment {
            entity_type,
            entity_id: row.entity_id,
            assignee_id: row.assignee_id,
            calendar_id: row.calendar_id,
            provider_event_id: row.provider_event_id,
            etag: row.etag,
            start_date: row.start_date,
            end_date: row.end_date,
            rate_per_hour: row.rate_per_hour,
        })
    }
}

// ============================================
// Scope / access models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct CalendarScopeRow {
    pub calendar_id: String,
    pub scope_kind: String,
    pub scope_id: Uuid,
}

impl From<CalendarScopeRow> for CalendarScope {
    fn from(row: CalendarScopeRow) -> Self {
        CalendarScope {
            calendar_id: row.calendar_id,
            scope_kind: ScopeKind::from(row.scope_kind.as_str()),
            scope_id: row.scope_id,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CalendarAccessRow {
    pub calendar_id: String,
    pub employee_id: Uuid,
    pub level: String,
}

impl From<CalendarAccessRow> for CalendarAccess {
    fn from(row: CalendarAccessRow) -> Self {
        CalendarAccess {
            calendar_id: row.calendar_id,
            employee_id: row.employee_id,
            level: AccessLevel::from(row.level.as_str()),
        }
    }
}
