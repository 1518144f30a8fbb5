// Webhook ingestion for calendar push notifications
//
// The provider retries any non-2xx response aggressively, so once the
// headers are minimally well-formed this endpoint always answers 200 and
// keeps internal failures out of the HTTP response. Malformed headers are
// the single 400 case. Validation against the channel registry is the
// security boundary: an unrecognized channel/resource pair is acknowledged
// and dropped.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use std::sync::Arc;

use fieldline_core::traits::ChannelRegistry;
use fieldline_core::SyncError;
use fieldline_worker::SyncTrigger;

use crate::common::StatusResponse;

const HEADER_CHANNEL_ID: &str = "x-goog-channel-id";
const HEADER_RESOURCE_ID: &str = "x-goog-resource-id";
const HEADER_RESOURCE_STATE: &str = "x-goog-resource-state";
const HEADER_RESOURCE_URI: &str = "x-goog-resource-uri";
const HEADER_MESSAGE_NUMBER: &str = "x-goog-message-number";

/// A validated push notification. The payload body carries no event data;
/// the headers are the whole message.
#[derive(Debug, Clone)]
pub struct PushNotification {
    pub channel_id: String,
    pub resource_id: String,
    pub resource_state: String,
    pub resource_uri: String,
    pub message_number: String,
}

impl PushNotification {
    /// Extract the required headers; any missing one rejects the request.
    fn from_headers(headers: &HeaderMap) -> Result<Self, SyncError> {
        let get = |name: &str| -> Result<String, SyncError> {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| SyncError::validation(format!("missing or malformed header: {name}")))
        };

        Ok(Self {
            channel_id: get(HEADER_CHANNEL_ID)?,
            resource_id: get(HEADER_RESOURCE_ID)?,
            resource_state: get(HEADER_RESOURCE_STATE)?,
            resource_uri: get(HEADER_RESOURCE_URI)?,
            message_number: get(HEADER_MESSAGE_NUMBER)?,
        })
    }
}

/// App state for webhook routes
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn ChannelRegistry>,
    pub sync: Arc<dyn SyncTrigger>,
}

impl AppState {
    pub fn new(registry: Arc<dyn ChannelRegistry>, sync: Arc<dyn SyncTrigger>) -> Self {
        Self { registry, sync }
    }
}

/// Create webhook routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/webhook/calendar",
            post(receive_notification).options(preflight),
        )
        .with_state(state)
}

/// POST /webhook/calendar - Receive a provider push notification
#[utoipa::path(
    post,
    path = "/webhook/calendar",
    responses(
        (status = 200, description = "Notification acknowledged", body = StatusResponse),
        (status = 400, description = "Required notification headers missing")
    ),
    tag = "webhook"
)]
pub async fn receive_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let notification = match PushNotification::from_headers(&headers) {
        Ok(notification) => notification,
        Err(err) => {
            tracing::debug!(error = %err, "rejecting malformed webhook request");
            return (StatusCode::BAD_REQUEST, Json(StatusResponse::new("invalid"))).into_response();
        }
    };

    tracing::debug!(
        channel_id = %notification.channel_id,
        state = %notification.resource_state,
        message_number = %notification.message_number,
        uri = %notification.resource_uri,
        "webhook notification received"
    );

    let status = match notification.resource_state.as_str() {
        // Initial handshake when a channel is created: acknowledge only
        "sync" => "acknowledged",
        "exists" | "update" => {
            match state
                .registry
                .validate(&notification.channel_id, &notification.resource_id)
                .await
            {
                Ok(Some(calendar_id)) => {
                    let sync = state.sync.clone();
                    tokio::spawn(async move {
                        sync.trigger_pull(&calendar_id).await;
                    });
                    "sync_scheduled"
                }
                Ok(None) => {
                    let err = SyncError::not_recognized(
                        notification.channel_id.as_str(),
                        notification.resource_id.as_str(),
                    );
                    tracing::warn!(error = %err, "webhook for unrecognized channel, ignoring");
                    "ignored"
                }
                Err(err) => {
                    // Internal failures stay internal; the provider gets a
                    // 200 either way
                    tracing::error!(error = %err, "channel validation failed");
                    "error"
                }
            }
        }
        other => {
            tracing::info!(state = other, "unrecognized resource state, ignoring");
            "ignored"
        }
    };

    (StatusCode::OK, Json(StatusResponse::new(status))).into_response()
}

/// OPTIONS /webhook/calendar - Permissive CORS preflight, no body
pub async fn preflight() -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "*"),
        ],
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{Duration as ChronoDuration, Utc};
    use fieldline_core::memory::InMemoryChannelRegistry;
    use fieldline_core::PushChannel;
    use http_body_util::BodyExt;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Clone, Default)]
    struct RecordingTrigger {
        pulls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl SyncTrigger for RecordingTrigger {
        async fn trigger_pull(&self, calendar_id: &str) {
            self.pulls.lock().await.push(calendar_id.to_string());
        }
    }

    async fn app_with_channel() -> (Router, RecordingTrigger) {
        let registry = InMemoryChannelRegistry::new();
        registry
            .seed(vec![PushChannel {
                channel_id: "ch-1".to_string(),
                resource_id: "res-1".to_string(),
                calendar_id: "cal-1".to_string(),
                expiration: Utc::now() + ChronoDuration::days(3),
            }])
            .await;
        let trigger = RecordingTrigger::default();
        let app = routes(AppState::new(
            Arc::new(registry),
            Arc::new(trigger.clone()),
        ));
        (app, trigger)
    }

    fn notification_request(channel_id: &str, resource_id: &str, state: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/webhook/calendar")
            .header("X-Goog-Channel-ID", channel_id)
            .header("X-Goog-Resource-ID", resource_id)
            .header("X-Goog-Resource-State", state)
            .header("X-Goog-Resource-URI", "https://www.googleapis.com/calendar/v3/calendars/cal-1/events")
            .header("X-Goog-Message-Number", "42")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn missing_headers_are_rejected_with_400() {
        let (app, _) = app_with_channel().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook/calendar")
                    .header("X-Goog-Channel-ID", "ch-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn known_channel_schedules_a_pull() {
        let (app, trigger) = app_with_channel().await;

        let response = app
            .oneshot(notification_request("ch-1", "res-1", "exists"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "sync_scheduled");

        // The pull runs on a spawned task
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(*trigger.pulls.lock().await, vec!["cal-1".to_string()]);
    }

    #[tokio::test]
    async fn unknown_channel_is_acknowledged_without_action() {
        let (app, trigger) = app_with_channel().await;

        let response = app
            .oneshot(notification_request("ch-9", "res-9", "exists"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ignored");

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(trigger.pulls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn handshake_notification_is_acknowledged_only() {
        let (app, trigger) = app_with_channel().await;

        let response = app
            .oneshot(notification_request("ch-1", "res-1", "sync"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "acknowledged");

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(trigger.pulls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unrecognized_state_is_acknowledged() {
        let (app, trigger) = app_with_channel().await;

        let response = app
            .oneshot(notification_request("ch-1", "res-1", "not_exists"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(trigger.pulls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn options_answers_with_permissive_cors() {
        let (app, _) = app_with_channel().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/webhook/calendar")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }
}
