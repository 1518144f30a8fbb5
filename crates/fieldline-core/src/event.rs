// Calendar event domain types
//
// CalendarEvent is the unified, provider-agnostic representation of a
// scheduled item. It is the shape that crosses every seam in the engine:
// the entity mapper produces it, the provider adapter consumes it, and the
// storage crate mirrors it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Internal entity kind that owns a calendar event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    WorkOrder,
    Project,
    AdHoc,
    ScheduleItem,
    TimeEntry,
    ProjectMilestone,
    ContactInteraction,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::WorkOrder => "work_order",
            EntityType::Project => "project",
            EntityType::AdHoc => "ad_hoc",
            EntityType::ScheduleItem => "schedule_item",
            EntityType::TimeEntry => "time_entry",
            EntityType::ProjectMilestone => "project_milestone",
            EntityType::ContactInteraction => "contact_interaction",
        }
    }

    /// Whether provider-side changes may be applied back onto this entity
    /// type. Push-only types are mirrored outward but never mutated by an
    /// incoming provider change.
    pub fn supports_inbound(&self) -> bool {
        !matches!(
            self,
            EntityType::TimeEntry | EntityType::Project | EntityType::ContactInteraction
        )
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "work_order" => Ok(EntityType::WorkOrder),
            "project" => Ok(EntityType::Project),
            "ad_hoc" => Ok(EntityType::AdHoc),
            "schedule_item" => Ok(EntityType::ScheduleItem),
            "time_entry" => Ok(EntityType::TimeEntry),
            "project_milestone" => Ok(EntityType::ProjectMilestone),
            "contact_interaction" => Ok(EntityType::ContactInteraction),
            other => Err(format!("unknown entity type: {other}")),
        }
    }
}

/// Who a calendar event is assigned to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AssigneeType {
    Employee,
    Subcontractor,
    Customer,
    Vendor,
    Contact,
}

impl AssigneeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssigneeType::Employee => "employee",
            AssigneeType::Subcontractor => "subcontractor",
            AssigneeType::Customer => "customer",
            AssigneeType::Vendor => "vendor",
            AssigneeType::Contact => "contact",
        }
    }
}

impl std::fmt::Display for AssigneeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AssigneeType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "employee" => Ok(AssigneeType::Employee),
            "subcontractor" => Ok(AssigneeType::Subcontractor),
            "customer" => Ok(AssigneeType::Customer),
            "vendor" => Ok(AssigneeType::Vendor),
            "contact" => Ok(AssigneeType::Contact),
            other => Err(format!("unknown assignee type: {other}")),
        }
    }
}

/// Unified calendar event representation
///
/// Invariants:
/// - `provider_event_id` is Some iff the event has been successfully created
///   on the provider at least once.
/// - `entity_type` + `entity_id` are immutable after creation. Re-pointing an
///   event at a different entity is not supported; delete and recreate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CalendarEvent {
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    pub is_all_day: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub entity_type: EntityType,
    pub entity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_type: Option<AssigneeType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    pub calendar_id: String,
    /// Provider-side event id, set on first successful push
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_event_id: Option<String>,
    /// Provider version stamp for optimistic-concurrency updates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    pub sync_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
}

impl CalendarEvent {
    /// Whether the event has ever been created on the provider
    pub fn is_synced(&self) -> bool {
        self.provider_event_id.is_some()
    }

    /// Whether a push is still owed to the provider
    pub fn sync_pending(&self) -> bool {
        self.sync_enabled && self.last_synced_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn entity_type_round_trips_through_str() {
        for ty in [
            EntityType::WorkOrder,
            EntityType::Project,
            EntityType::AdHoc,
            EntityType::ScheduleItem,
            EntityType::TimeEntry,
            EntityType::ProjectMilestone,
            EntityType::ContactInteraction,
        ] {
            assert_eq!(EntityType::from_str(ty.as_str()), Ok(ty));
        }
    }

    #[test]
    fn push_only_types_reject_inbound() {
        assert!(!EntityType::TimeEntry.supports_inbound());
        assert!(!EntityType::Project.supports_inbound());
        assert!(!EntityType::ContactInteraction.supports_inbound());
        assert!(EntityType::WorkOrder.supports_inbound());
        assert!(EntityType::AdHoc.supports_inbound());
        assert!(EntityType::ScheduleItem.supports_inbound());
        assert!(EntityType::ProjectMilestone.supports_inbound());
    }
}
