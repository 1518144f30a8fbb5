// Unit tests for the Google Calendar adapter

use chrono::{NaiveDate, TimeZone, Utc};
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fieldline_core::{
    AdapterError, CalendarClient, CalendarEvent, EntityType, RetryPolicy,
};

use crate::convert::{from_google, to_google, PROP_ENTITY_ID, PROP_ENTITY_TYPE};
use crate::provider::{classify_error, is_retryable_status};
use crate::types::GoogleEvent;
use crate::GoogleCalendarClient;

fn sample_event() -> CalendarEvent {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    CalendarEvent {
        id: Uuid::now_v7(),
        title: "Pour foundation".to_string(),
        description: Some("Section B".to_string()),
        start: Utc.with_ymd_and_hms(2024, 6, 3, 7, 0, 0).unwrap(),
        end: Some(Utc.with_ymd_and_hms(2024, 6, 3, 15, 0, 0).unwrap()),
        is_all_day: false,
        location: None,
        entity_type: EntityType::WorkOrder,
        entity_id: "WO-17".to_string(),
        assignee_type: None,
        assignee_id: None,
        calendar_id: "cal-1".to_string(),
        provider_event_id: None,
        etag: None,
        sync_enabled: true,
        last_synced_at: None,
        created_at: now,
        updated_at: now,
        created_by: None,
    }
}

fn fast_client(base_url: String) -> GoogleCalendarClient {
    GoogleCalendarClient::with_base_url("test-token", base_url).with_retry(RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    })
}

// ============================================================================
// Status mapping
// ============================================================================

#[test]
fn server_errors_and_rate_limits_are_retryable() {
    assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
    assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
    assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
    assert!(is_retryable_status(StatusCode::REQUEST_TIMEOUT));
    assert!(!is_retryable_status(StatusCode::NOT_FOUND));
    assert!(!is_retryable_status(StatusCode::PRECONDITION_FAILED));
}

#[test]
fn terminal_statuses_classify_into_the_taxonomy() {
    assert!(classify_error("op", StatusCode::NOT_FOUND, None).is_not_found());
    assert!(classify_error("op", StatusCode::GONE, None).is_not_found());
    assert!(matches!(
        classify_error("op", StatusCode::PRECONDITION_FAILED, Some("gev-1")),
        AdapterError::Conflict { provider_event_id } if provider_event_id == "gev-1"
    ));
    assert!(matches!(
        classify_error("op", StatusCode::FORBIDDEN, None),
        AdapterError::Permanent(_)
    ));
}

// ============================================================================
// Conversions
// ============================================================================

#[test]
fn to_google_carries_entity_identity_in_private_properties() {
    let payload = to_google(&sample_event());
    let private = payload.extended_properties.unwrap().private;
    assert_eq!(private.get(PROP_ENTITY_TYPE).map(String::as_str), Some("work_order"));
    assert_eq!(private.get(PROP_ENTITY_ID).map(String::as_str), Some("WO-17"));
    assert!(payload.start.unwrap().date_time.is_some());
}

#[test]
fn to_google_all_day_uses_exclusive_date_end() {
    let mut event = sample_event();
    event.is_all_day = true;
    event.start = Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap();
    event.end = None;

    let payload = to_google(&event);
    assert_eq!(
        payload.start.unwrap().date,
        Some(NaiveDate::from_ymd_opt(2024, 6, 3).unwrap())
    );
    assert_eq!(
        payload.end.unwrap().date,
        Some(NaiveDate::from_ymd_opt(2024, 6, 4).unwrap())
    );
}

#[test]
fn from_google_recovers_entity_and_cancellation() {
    let wire: GoogleEvent = serde_json::from_value(json!({
        "id": "gev-9",
        "etag": "\"etag-2\"",
        "status": "cancelled",
        "summary": "Pour foundation",
        "start": {"dateTime": "2024-06-03T07:00:00Z"},
        "extendedProperties": {
            "private": {
                "fieldline_entity_type": "work_order",
                "fieldline_entity_id": "WO-17"
            }
        }
    }))
    .unwrap();

    let change = from_google(wire).unwrap();
    assert!(change.cancelled);
    assert_eq!(change.provider_event_id, "gev-9");
    assert_eq!(change.entity, Some((EntityType::WorkOrder, "WO-17".to_string())));
}

#[test]
fn from_google_all_day_dates_become_midnight() {
    let wire: GoogleEvent = serde_json::from_value(json!({
        "id": "gev-10",
        "etag": "\"etag-1\"",
        "status": "confirmed",
        "summary": "Inspection",
        "start": {"date": "2024-06-05"},
        "end": {"date": "2024-06-06"}
    }))
    .unwrap();

    let change = from_google(wire).unwrap();
    assert!(change.is_all_day);
    assert_eq!(change.start, Utc.with_ymd_and_hms(2024, 6, 5, 0, 0, 0).unwrap());
    assert!(change.entity.is_none());
}

// ============================================================================
// HTTP behavior
// ============================================================================

#[tokio::test]
async fn create_event_returns_provider_version() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calendars/cal-1/events"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "gev-1",
            "etag": "\"etag-1\"",
            "status": "confirmed"
        })))
        .mount(&server)
        .await;

    let client = fast_client(server.uri());
    let version = client.create_event("cal-1", &sample_event()).await.unwrap();
    assert_eq!(version.provider_event_id, "gev-1");
    assert_eq!(version.etag, "\"etag-1\"");
}

#[tokio::test]
async fn create_event_retries_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calendars/cal-1/events"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/calendars/cal-1/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "gev-1",
            "etag": "\"etag-1\""
        })))
        .mount(&server)
        .await;

    let client = fast_client(server.uri());
    let version = client.create_event("cal-1", &sample_event()).await.unwrap();
    assert_eq!(version.provider_event_id, "gev-1");
}

#[tokio::test]
async fn create_event_gives_up_after_attempt_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calendars/cal-1/events"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = fast_client(server.uri());
    let err = client
        .create_event("cal-1", &sample_event())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn update_event_sends_if_match_and_surfaces_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/calendars/cal-1/events/gev-1"))
        .and(header("if-match", "\"etag-1\""))
        .respond_with(ResponseTemplate::new(412))
        .mount(&server)
        .await;

    let mut event = sample_event();
    event.provider_event_id = Some("gev-1".to_string());
    event.etag = Some("\"etag-1\"".to_string());

    let client = fast_client(server.uri());
    let err = client.update_event("cal-1", &event).await.unwrap_err();
    assert!(matches!(
        err,
        AdapterError::Conflict { provider_event_id } if provider_event_id == "gev-1"
    ));
}

#[tokio::test]
async fn update_event_without_prior_push_is_permanent() {
    let client = fast_client("http://localhost:1".to_string());
    let err = client
        .update_event("cal-1", &sample_event())
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Permanent(_)));
}

#[tokio::test]
async fn delete_event_maps_gone_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/calendars/cal-1/events/gev-1"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let client = fast_client(server.uri());
    let err = client.delete_event("cal-1", "gev-1").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn list_changes_paginates_to_the_sync_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/calendars/cal-1/events"))
        .and(query_param("syncToken", "tok-1"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "gev-2", "etag": "\"e2\"", "status": "confirmed",
                       "summary": "B", "start": {"dateTime": "2024-06-02T08:00:00Z"}}],
            "nextSyncToken": "tok-2"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/calendars/cal-1/events"))
        .and(query_param("syncToken", "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "gev-1", "etag": "\"e1\"", "status": "confirmed",
                       "summary": "A", "start": {"dateTime": "2024-06-01T08:00:00Z"}}],
            "nextPageToken": "page-2"
        })))
        .mount(&server)
        .await;

    let client = fast_client(server.uri());
    let changes = client
        .list_changes_since("cal-1", Some("tok-1"))
        .await
        .unwrap();
    assert_eq!(changes.changes.len(), 2);
    assert_eq!(changes.next_sync_token, "tok-2");
}

#[tokio::test]
async fn list_changes_maps_gone_to_invalid_sync_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/calendars/cal-1/events"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let client = fast_client(server.uri());
    let err = client
        .list_changes_since("cal-1", Some("tok-stale"))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::InvalidSyncToken));
}

#[tokio::test]
async fn watch_parses_resource_and_expiration() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calendars/cal-1/events/watch"))
        .and(body_partial_json(json!({"type": "web_hook"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "ch-1",
            "resourceId": "res-1",
            "expiration": "1717243200000"
        })))
        .mount(&server)
        .await;

    let client = fast_client(server.uri());
    let watch = client
        .watch(
            "cal-1",
            "ch-1",
            "https://app.fieldline.dev/webhook/calendar",
            Duration::from_secs(604_800),
        )
        .await
        .unwrap();
    assert_eq!(watch.resource_id, "res-1");
    assert_eq!(
        watch.expiration,
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn stop_watch_maps_missing_channel_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/channels/stop"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = fast_client(server.uri());
    let err = client.stop_watch("ch-gone", "res-gone").await.unwrap_err();
    assert!(err.is_not_found());
}
