// Conversions between the core event representation and Google wire types
//
// Entity identity crosses the wire in private extended properties so that
// a pulled change can be matched back to its owning internal entity. Events
// created directly on the calendar by a human carry no such properties and
// surface with `entity: None`.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{NaiveTime, Utc};
use fieldline_core::{CalendarEvent, EntityType, ProviderEvent};

use crate::types::{GoogleEvent, GoogleEventTime, GoogleExtendedProperties};

pub const PROP_ENTITY_TYPE: &str = "fieldline_entity_type";
pub const PROP_ENTITY_ID: &str = "fieldline_entity_id";
pub const PROP_ASSIGNEE_TYPE: &str = "fieldline_assignee_type";
pub const PROP_ASSIGNEE_ID: &str = "fieldline_assignee_id";

/// Build the wire payload for an outbound push
pub fn to_google(event: &CalendarEvent) -> GoogleEvent {
    let (start, end) = if event.is_all_day {
        let start_date = event.start.date_naive();
        // Google all-day ends are exclusive; a missing end means one day
        let end_date = event
            .end
            .map(|e| e.date_naive())
            .or_else(|| start_date.succ_opt())
            .unwrap_or(start_date);
        (
            GoogleEventTime {
                date: Some(start_date),
                ..Default::default()
            },
            Some(GoogleEventTime {
                date: Some(end_date),
                ..Default::default()
            }),
        )
    } else {
        (
            GoogleEventTime {
                date_time: Some(event.start),
                ..Default::default()
            },
            event.end.map(|e| GoogleEventTime {
                date_time: Some(e),
                ..Default::default()
            }),
        )
    };

    let mut private = BTreeMap::new();
    private.insert(PROP_ENTITY_TYPE.to_string(), event.entity_type.to_string());
    private.insert(PROP_ENTITY_ID.to_string(), event.entity_id.clone());
    if let Some(assignee_type) = event.assignee_type {
        private.insert(PROP_ASSIGNEE_TYPE.to_string(), assignee_type.to_string());
    }
    if let Some(assignee_id) = &event.assignee_id {
        private.insert(PROP_ASSIGNEE_ID.to_string(), assignee_id.clone());
    }

    GoogleEvent {
        id: None,
        etag: None,
        status: Some("confirmed".to_string()),
        summary: Some(event.title.clone()),
        description: event.description.clone(),
        location: event.location.clone(),
        start: Some(start),
        end,
        extended_properties: Some(GoogleExtendedProperties { private }),
    }
}

/// Interpret a pulled event resource.
///
/// Returns None for resources without an id (never observed in practice,
/// but the API marks the field optional).
pub fn from_google(event: GoogleEvent) -> Option<ProviderEvent> {
    let provider_event_id = event.id?;
    let cancelled = event.status.as_deref() == Some("cancelled");

    let is_all_day = event
        .start
        .as_ref()
        .map(|s| s.date.is_some())
        .unwrap_or(false);
    let start = event
        .start
        .as_ref()
        .and_then(resolve_time)
        .unwrap_or_else(Utc::now);
    let end = event.end.as_ref().and_then(resolve_time);

    let private = event
        .extended_properties
        .map(|p| p.private)
        .unwrap_or_default();
    let entity = match (private.get(PROP_ENTITY_TYPE), private.get(PROP_ENTITY_ID)) {
        (Some(ty), Some(id)) => EntityType::from_str(ty).ok().map(|ty| (ty, id.clone())),
        _ => None,
    };

    Some(ProviderEvent {
        provider_event_id,
        etag: event.etag.unwrap_or_default(),
        title: event.summary.unwrap_or_default(),
        description: event.description,
        start,
        end,
        is_all_day,
        location: event.location,
        entity,
        cancelled,
    })
}

fn resolve_time(time: &GoogleEventTime) -> Option<chrono::DateTime<Utc>> {
    time.date_time
        .or_else(|| time.date.map(|d| d.and_time(NaiveTime::MIN).and_utc()))
}
