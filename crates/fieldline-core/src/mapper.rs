// Entity mapper
//
// Translates internal scheduling entities into the unified CalendarEvent
// representation and back. Pure transformation; persistence is the
// caller's responsibility.
//
// Mapping rules are per entity type:
// - time entries combine a work date with start/end clock times
// - milestones and projects are all-day
// - ad-hoc items and schedule items map their fields directly
//
// Push-only types (time_entry, project, contact_interaction) are mirrored
// outward but never mutated by provider changes; applying an inbound change
// to one returns `SyncError::InboundNotSupported` rather than silently
// dropping data.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::event::{AssigneeType, CalendarEvent, EntityType};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// A field work order with a scheduled window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WorkOrder {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub assignee_type: Option<AssigneeType>,
    pub assignee_id: Option<String>,
}

/// A project's overall date span
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// A free-standing calendar item with no owning record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AdHocEvent {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub is_all_day: bool,
    pub location: Option<String>,
}

/// A line on a project schedule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ScheduleItem {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub location: Option<String>,
}

/// Logged labor: a work date plus clock times
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct TimeEntry {
    pub id: String,
    pub employee_id: String,
    pub work_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub notes: Option<String>,
}

/// A dated project milestone
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ProjectMilestone {
    pub id: String,
    pub name: String,
    pub due_date: NaiveDate,
    pub description: Option<String>,
}

/// A scheduled touchpoint with a customer or vendor contact
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ContactInteraction {
    pub id: String,
    pub contact_id: String,
    pub subject: String,
    pub scheduled_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Any internal scheduling entity the engine can mirror
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleEntity {
    WorkOrder(WorkOrder),
    Project(Project),
    AdHoc(AdHocEvent),
    ScheduleItem(ScheduleItem),
    TimeEntry(TimeEntry),
    ProjectMilestone(ProjectMilestone),
    ContactInteraction(ContactInteraction),
}

impl ScheduleEntity {
    pub fn entity_type(&self) -> EntityType {
        match self {
            ScheduleEntity::WorkOrder(_) => EntityType::WorkOrder,
            ScheduleEntity::Project(_) => EntityType::Project,
            ScheduleEntity::AdHoc(_) => EntityType::AdHoc,
            ScheduleEntity::ScheduleItem(_) => EntityType::ScheduleItem,
            ScheduleEntity::TimeEntry(_) => EntityType::TimeEntry,
            ScheduleEntity::ProjectMilestone(_) => EntityType::ProjectMilestone,
            ScheduleEntity::ContactInteraction(_) => EntityType::ContactInteraction,
        }
    }

    pub fn entity_id(&self) -> &str {
        match self {
            ScheduleEntity::WorkOrder(w) => &w.id,
            ScheduleEntity::Project(p) => &p.id,
            ScheduleEntity::AdHoc(a) => &a.id,
            ScheduleEntity::ScheduleItem(s) => &s.id,
            ScheduleEntity::TimeEntry(t) => &t.id,
            ScheduleEntity::ProjectMilestone(m) => &m.id,
            ScheduleEntity::ContactInteraction(c) => &c.id,
        }
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Exclusive all-day end: midnight of the day after `date`
fn day_after(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.succ_opt().map(midnight)
}

/// Build the unified calendar event for an internal entity.
///
/// Provider fields (`provider_event_id`, `etag`, `last_synced_at`) start
/// empty; they are filled in by the first successful push.
pub fn to_calendar_event(entity: &ScheduleEntity, calendar_id: &str) -> CalendarEvent {
    let now = Utc::now();
    let mut event = CalendarEvent {
        id: Uuid::now_v7(),
        title: String::new(),
        description: None,
        start: now,
        end: None,
        is_all_day: false,
        location: None,
        entity_type: entity.entity_type(),
        entity_id: entity.entity_id().to_string(),
        assignee_type: None,
        assignee_id: None,
        calendar_id: calendar_id.to_string(),
        provider_event_id: None,
        etag: None,
        sync_enabled: true,
        last_synced_at: None,
        created_at: now,
        updated_at: now,
        created_by: None,
    };

    match entity {
        ScheduleEntity::WorkOrder(w) => {
            event.title = w.title.clone();
            event.description = w.description.clone();
            event.start = w.scheduled_start;
            event.end = w.scheduled_end;
            event.location = w.location.clone();
            event.assignee_type = w.assignee_type;
            event.assignee_id = w.assignee_id.clone();
        }
        ScheduleEntity::Project(p) => {
            event.title = p.name.clone();
            event.description = p.description.clone();
            event.start = midnight(p.start_date);
            event.end = p.end_date.and_then(day_after);
            event.is_all_day = true;
        }
        ScheduleEntity::AdHoc(a) => {
            event.title = a.title.clone();
            event.description = a.description.clone();
            event.start = a.start;
            event.end = a.end;
            event.is_all_day = a.is_all_day;
            event.location = a.location.clone();
        }
        ScheduleEntity::ScheduleItem(s) => {
            event.title = s.title.clone();
            event.description = s.description.clone();
            event.start = s.start;
            event.end = s.end;
            event.location = s.location.clone();
        }
        ScheduleEntity::TimeEntry(t) => {
            event.title = format!("Time entry ({})", t.employee_id);
            event.description = t.notes.clone();
            event.start = t.work_date.and_time(t.start_time).and_utc();
            event.end = t.end_time.map(|end| t.work_date.and_time(end).and_utc());
            event.assignee_type = Some(AssigneeType::Employee);
            event.assignee_id = Some(t.employee_id.clone());
        }
        ScheduleEntity::ProjectMilestone(m) => {
            event.title = m.name.clone();
            event.description = m.description.clone();
            event.start = midnight(m.due_date);
            event.is_all_day = true;
        }
        ScheduleEntity::ContactInteraction(c) => {
            event.title = c.subject.clone();
            event.description = c.notes.clone();
            event.start = c.scheduled_at;
            event.assignee_type = Some(AssigneeType::Contact);
            event.assignee_id = Some(c.contact_id.clone());
        }
    }

    event
}

/// Apply an incoming calendar event onto an entity, returning the updated
/// entity. Defined for every entity type; push-only types reject the
/// application with `SyncError::InboundNotSupported`.
pub fn apply_calendar_event(event: &CalendarEvent, entity: ScheduleEntity) -> Result<ScheduleEntity> {
    match entity {
        ScheduleEntity::WorkOrder(mut w) => {
            w.title = event.title.clone();
            w.description = event.description.clone();
            w.scheduled_start = event.start;
            w.scheduled_end = event.end;
            w.location = event.location.clone();
            w.assignee_type = event.assignee_type;
            w.assignee_id = event.assignee_id.clone();
            Ok(ScheduleEntity::WorkOrder(w))
        }
        ScheduleEntity::AdHoc(mut a) => {
            a.title = event.title.clone();
            a.description = event.description.clone();
            a.start = event.start;
            a.end = event.end;
            a.is_all_day = event.is_all_day;
            a.location = event.location.clone();
            Ok(ScheduleEntity::AdHoc(a))
        }
        ScheduleEntity::ScheduleItem(mut s) => {
            s.title = event.title.clone();
            s.description = event.description.clone();
            s.start = event.start;
            s.end = event.end;
            s.location = event.location.clone();
            Ok(ScheduleEntity::ScheduleItem(s))
        }
        ScheduleEntity::ProjectMilestone(mut m) => {
            m.name = event.title.clone();
            m.description = event.description.clone();
            m.due_date = event.start.date_naive();
            Ok(ScheduleEntity::ProjectMilestone(m))
        }
        ScheduleEntity::TimeEntry(_)
        | ScheduleEntity::Project(_)
        | ScheduleEntity::ContactInteraction(_) => {
            Err(SyncError::InboundNotSupported(entity.entity_type()))
        }
    }
}

/// Reconstruct the scheduling entity a mirror row represents.
///
/// Only defined for inbound-capable types; the pull-sync path uses this to
/// rebuild the prior entity state before applying a provider change.
pub fn entity_snapshot(event: &CalendarEvent) -> Result<ScheduleEntity> {
    match event.entity_type {
        EntityType::WorkOrder => Ok(ScheduleEntity::WorkOrder(WorkOrder {
            id: event.entity_id.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
            scheduled_start: event.start,
            scheduled_end: event.end,
            location: event.location.clone(),
            assignee_type: event.assignee_type,
            assignee_id: event.assignee_id.clone(),
        })),
        EntityType::AdHoc => Ok(ScheduleEntity::AdHoc(AdHocEvent {
            id: event.entity_id.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
            start: event.start,
            end: event.end,
            is_all_day: event.is_all_day,
            location: event.location.clone(),
        })),
        EntityType::ScheduleItem => Ok(ScheduleEntity::ScheduleItem(ScheduleItem {
            id: event.entity_id.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
            start: event.start,
            end: event.end,
            location: event.location.clone(),
        })),
        EntityType::ProjectMilestone => Ok(ScheduleEntity::ProjectMilestone(ProjectMilestone {
            id: event.entity_id.clone(),
            name: event.title.clone(),
            due_date: event.start.date_naive(),
            description: event.description.clone(),
        })),
        EntityType::TimeEntry | EntityType::Project | EntityType::ContactInteraction => {
            Err(SyncError::InboundNotSupported(event.entity_type))
        }
    }
}
