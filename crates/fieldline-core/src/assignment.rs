// Calendar assignment domain type
//
// A derived record created alongside a CalendarEvent when the event
// represents billable assigned work. Not synchronized bidirectionally;
// consumed only by the cost rollup engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::event::EntityType;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Billable work assignment spanning a date range on a calendar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CalendarAssignment {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub assignee_id: String,
    pub calendar_id: String,
    pub provider_event_id: String,
    pub etag: Option<String>,
    pub start_date: NaiveDate,
    /// None means open-ended
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// None means the rate is unknown, not zero
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_per_hour: Option<f64>,
}
