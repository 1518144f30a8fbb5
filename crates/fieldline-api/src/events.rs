// Calendar event CRUD HTTP routes
//
// These routes drive the outbound half of the sync: a local mutation is
// persisted first, then pushed to the provider. A push that fails after
// the adapter's retries leaves the event pending rather than failing the
// request; a later pull or a manual resync reconciles it. The only
// provider outcome surfaced to callers is an etag conflict.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use fieldline_core::{
    mapper, traits::SyncCursorStore, AdapterError, CalendarAssignment, CalendarEvent,
    ScheduleEntity, SyncError,
};
use fieldline_storage::{Database, UpdateCalendarEvent};
use fieldline_worker::{PushOutcome, SyncService, SyncTrigger};

use crate::common::{ListResponse, StatusResponse};

/// Request to create a calendar event from an internal scheduling entity
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    /// Calendar the event lives on.
    #[schema(example = "primary")]
    pub calendar_id: String,
    /// The internal entity the event mirrors.
    pub entity: ScheduleEntity,
    /// Whether to push the event to the provider.
    #[serde(default = "default_sync_enabled")]
    pub sync_enabled: bool,
    /// Acting employee, checked against calendar access.
    #[serde(default)]
    pub employee_id: Option<Uuid>,
    /// Hourly rate for the billable assignment created alongside the
    /// event when it has an assignee. Omit when the rate is unknown.
    #[serde(default)]
    pub rate_per_hour: Option<f64>,
}

fn default_sync_enabled() -> bool {
    true
}

/// Request to update a calendar event. Only provided fields change.
/// The owning entity cannot be re-pointed; delete and recreate instead.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateEventRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_all_day: Option<bool>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub sync_enabled: Option<bool>,
    /// Acting employee, checked against calendar access.
    #[serde(default)]
    pub employee_id: Option<Uuid>,
}

/// App state for event routes
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub sync: Arc<SyncService>,
    pub cursors: Arc<dyn SyncCursorStore>,
    pub trigger: Arc<dyn SyncTrigger>,
}

/// Create event routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/events", post(create_event))
        .route(
            "/v1/events/:id",
            get(get_event).patch(update_event).delete(delete_event),
        )
        .route("/v1/calendars/:calendar_id/events", get(list_calendar_events))
        .route("/v1/calendars/:calendar_id/resync", post(resync_calendar))
        .with_state(state)
}

/// Require write access when the calendar is scope-managed and an acting
/// employee is known.
async fn check_write_access(
    db: &Database,
    calendar_id: &str,
    employee_id: Option<Uuid>,
) -> Result<(), StatusCode> {
    let Some(employee_id) = employee_id else {
        return Ok(());
    };
    let scope = db.get_scope(calendar_id).await.map_err(|e| {
        tracing::error!("Failed to load calendar scope: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if scope.is_none() {
        return Ok(());
    }

    let access = db
        .access_level(calendar_id, employee_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load calendar access: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    match access {
        Some(row) if fieldline_core::AccessLevel::from(row.level.as_str()).can_write() => Ok(()),
        _ => Err(StatusCode::FORBIDDEN),
    }
}

fn row_to_event(
    row: fieldline_storage::CalendarEventRow,
) -> Result<CalendarEvent, StatusCode> {
    CalendarEvent::try_from(row).map_err(|e| {
        tracing::error!("Corrupt calendar event row: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// POST /v1/events - Create an event and push it to the provider
#[utoipa::path(
    post,
    path = "/v1/events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = CalendarEvent),
        (status = 403, description = "Caller may not write to this calendar"),
        (status = 500, description = "Internal server error")
    ),
    tag = "events"
)]
pub async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<CalendarEvent>), StatusCode> {
    check_write_access(&state.db, &req.calendar_id, req.employee_id).await?;

    let mut event = mapper::to_calendar_event(&req.entity, &req.calendar_id);
    event.sync_enabled = req.sync_enabled;
    event.created_by = req.employee_id;

    state.db.insert_event(&event).await.map_err(|e| {
        tracing::error!("Failed to insert event: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if event.sync_enabled {
        match state.sync.push_create(&event).await {
            Ok(PushOutcome::Synced(version)) => {
                if let Some(assignee_id) = &event.assignee_id {
                    let assignment = CalendarAssignment {
                        entity_type: event.entity_type,
                        entity_id: event.entity_id.clone(),
                        assignee_id: assignee_id.clone(),
                        calendar_id: event.calendar_id.clone(),
                        provider_event_id: version.provider_event_id.clone(),
                        etag: Some(version.etag.clone()),
                        start_date: event.start.date_naive(),
                        end_date: event.end.map(|e| e.date_naive()),
                        rate_per_hour: req.rate_per_hour,
                    };
                    if let Err(e) = state.db.insert_assignment(&assignment).await {
                        tracing::error!("Failed to record assignment: {}", e);
                    }
                }
            }
            Ok(PushOutcome::Pending) => {}
            Err(err) => {
                tracing::warn!(event_id = %event.id, error = %err, "initial push failed, event left pending");
            }
        }
    }

    // Re-read so the response carries provider linkage written by the push
    let row = state
        .db
        .get_event(event.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to reload event: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((StatusCode::CREATED, Json(row_to_event(row)?)))
}

/// GET /v1/events/{id} - Get an event
#[utoipa::path(
    get,
    path = "/v1/events/{id}",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event found", body = CalendarEvent),
        (status = 404, description = "Event not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "events"
)]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CalendarEvent>, StatusCode> {
    let row = state
        .db
        .get_event(id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get event: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(row_to_event(row)?))
}

/// GET /v1/calendars/{calendar_id}/events - List events on a calendar
#[utoipa::path(
    get,
    path = "/v1/calendars/{calendar_id}/events",
    params(("calendar_id" = String, Path, description = "Calendar ID")),
    responses(
        (status = 200, description = "Events on the calendar", body = ListResponse<CalendarEvent>),
        (status = 500, description = "Internal server error")
    ),
    tag = "events"
)]
pub async fn list_calendar_events(
    State(state): State<AppState>,
    Path(calendar_id): Path<String>,
) -> Result<Json<ListResponse<CalendarEvent>>, StatusCode> {
    let rows = state
        .db
        .list_events_for_calendar(&calendar_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list events: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let events = rows
        .into_iter()
        .map(row_to_event)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(ListResponse::new(events)))
}

/// PATCH /v1/events/{id} - Update an event and push the change
#[utoipa::path(
    patch,
    path = "/v1/events/{id}",
    params(("id" = Uuid, Path, description = "Event ID")),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Event updated", body = CalendarEvent),
        (status = 403, description = "Caller may not write to this calendar"),
        (status = 404, description = "Event not found"),
        (status = 409, description = "Provider copy changed since last sync (etag conflict)"),
        (status = 500, description = "Internal server error")
    ),
    tag = "events"
)]
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<Json<CalendarEvent>, StatusCode> {
    let existing = state
        .db
        .get_event(id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get event: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    check_write_access(&state.db, &existing.calendar_id, req.employee_id).await?;

    let input = UpdateCalendarEvent {
        title: req.title,
        description: req.description,
        start: req.start,
        end: req.end,
        is_all_day: req.is_all_day,
        location: req.location,
        assignee_type: None,
        assignee_id: None,
        sync_enabled: req.sync_enabled,
    };

    let row = state
        .db
        .update_event(id, input)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update event: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let mut event = row_to_event(row)?;

    if event.sync_enabled && event.provider_event_id.is_some() {
        match state.sync.push_update(&event).await {
            Ok(PushOutcome::Synced(_)) => {
                if let Ok(Some(row)) = state.db.get_event(id).await {
                    event = row_to_event(row)?;
                }
            }
            Ok(PushOutcome::Pending) => {}
            Err(SyncError::Adapter(AdapterError::Conflict { .. })) => {
                // The provider copy moved underneath us; the caller decides
                return Err(StatusCode::CONFLICT);
            }
            Err(err) => {
                tracing::warn!(event_id = %id, error = %err, "push failed, update left pending");
            }
        }
    }

    Ok(Json(event))
}

/// DELETE /v1/events/{id} - Delete an event locally and on the provider
#[utoipa::path(
    delete,
    path = "/v1/events/{id}",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 404, description = "Event not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "events"
)]
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let row = state
        .db
        .get_event(id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get event: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let event = row_to_event(row)?;

    // Best-effort provider-side deletion; the local delete proceeds either
    // way and a later pull reconciles stragglers
    if let Err(err) = state.sync.push_delete(&event).await {
        tracing::warn!(event_id = %id, error = %err, "provider-side delete failed");
    }

    state.db.delete_event(id).await.map_err(|e| {
        tracing::error!("Failed to delete event: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/calendars/{calendar_id}/resync - Force a full resync
#[utoipa::path(
    post,
    path = "/v1/calendars/{calendar_id}/resync",
    params(("calendar_id" = String, Path, description = "Calendar ID")),
    responses(
        (status = 202, description = "Full resync scheduled", body = StatusResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "events"
)]
pub async fn resync_calendar(
    State(state): State<AppState>,
    Path(calendar_id): Path<String>,
) -> Result<(StatusCode, Json<StatusResponse>), StatusCode> {
    state.cursors.invalidate(&calendar_id).await.map_err(|e| {
        tracing::error!("Failed to invalidate cursor: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let trigger = state.trigger.clone();
    tokio::spawn(async move {
        trigger.trigger_pull(&calendar_id).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(StatusResponse::new("resync_scheduled")),
    ))
}
