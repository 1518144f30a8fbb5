// Google Calendar client
//
// Implements the core CalendarClient trait against the Calendar v3 REST
// API. Transient failures (timeouts, 5xx, rate limiting) are retried here
// with exponential backoff; callers only ever see the final outcome.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;
use std::time::Duration;

use fieldline_core::{
    AdapterError, CalendarClient, CalendarEvent, ChangeSet, EventVersion, RetryPolicy, WatchResult,
};

use crate::convert::{from_google, to_google};
use crate::types::{GoogleChannel, GoogleChannelParams, GoogleChannelRequest, GoogleEventsPage};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
const LIST_PAGE_SIZE: &str = "250";

/// Google Calendar v3 client
///
/// # Example
///
/// ```ignore
/// use fieldline_gcal::GoogleCalendarClient;
///
/// let client = GoogleCalendarClient::from_env()?;
/// // or
/// let client = GoogleCalendarClient::new("your-api-token");
/// ```
#[derive(Clone)]
pub struct GoogleCalendarClient {
    client: reqwest::Client,
    api_token: String,
    base_url: String,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl GoogleCalendarClient {
    /// Create a new client with the given API token
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_token: api_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    /// Create a new client from the GCAL_API_TOKEN environment variable
    pub fn from_env() -> anyhow::Result<Self> {
        let api_token = std::env::var("GCAL_API_TOKEN")
            .map_err(|_| anyhow::anyhow!("GCAL_API_TOKEN environment variable not set"))?;
        Ok(Self::new(api_token))
    }

    /// Create a new client with a custom API base URL (for testing)
    pub fn with_base_url(api_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::new(api_token)
        }
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the retry policy for transient failures
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!("{}/calendars/{}/events", self.base_url, calendar_id)
    }

    /// Send a request, retrying transient failures with backoff.
    ///
    /// Timeouts and connection errors are retryable; any response, even a
    /// non-2xx one, ends the loop once its status is not transient so the
    /// caller can classify it.
    async fn send_with_retry<F>(
        &self,
        op: &str,
        build: F,
    ) -> Result<reqwest::Response, AdapterError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            let result = build()
                .timeout(self.request_timeout)
                .bearer_auth(&self.api_token)
                .send()
                .await;

            let failure = match result {
                Ok(response) if is_retryable_status(response.status()) => {
                    AdapterError::retryable(format!("{op}: HTTP {}", response.status()))
                }
                Ok(response) => return Ok(response),
                Err(err) if err.is_timeout() || err.is_connect() => {
                    AdapterError::retryable(format!("{op}: {err}"))
                }
                Err(err) => return Err(AdapterError::permanent(format!("{op}: {err}"))),
            };

            attempt += 1;
            if attempt >= self.retry.max_attempts {
                return Err(failure);
            }
            let delay = self.retry.delay_for(attempt - 1);
            tracing::debug!(op, attempt, delay_ms = delay.as_millis() as u64, "retrying provider call");
            tokio::time::sleep(delay).await;
        }
    }

    async fn parse_version(
        op: &str,
        response: reqwest::Response,
    ) -> Result<EventVersion, AdapterError> {
        let event: crate::types::GoogleEvent = response
            .json()
            .await
            .map_err(|e| AdapterError::permanent(format!("{op}: invalid response body: {e}")))?;

        match (event.id, event.etag) {
            (Some(provider_event_id), Some(etag)) => Ok(EventVersion {
                provider_event_id,
                etag,
            }),
            _ => Err(AdapterError::permanent(format!(
                "{op}: response missing id or etag"
            ))),
        }
    }
}

#[async_trait]
impl CalendarClient for GoogleCalendarClient {
    async fn create_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> Result<EventVersion, AdapterError> {
        let url = self.events_url(calendar_id);
        let payload = to_google(event);

        let response = self
            .send_with_retry("events.insert", || self.client.post(&url).json(&payload))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_error("events.insert", status, None));
        }
        Self::parse_version("events.insert", response).await
    }

    async fn update_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> Result<EventVersion, AdapterError> {
        let provider_event_id = event.provider_event_id.as_deref().ok_or_else(|| {
            AdapterError::permanent("events.update: event has never been pushed")
        })?;
        let etag = event
            .etag
            .as_deref()
            .ok_or_else(|| AdapterError::permanent("events.update: event has no etag"))?;

        let url = format!("{}/{}", self.events_url(calendar_id), provider_event_id);
        let payload = to_google(event);

        let response = self
            .send_with_retry("events.update", || {
                self.client
                    .put(&url)
                    .header(reqwest::header::IF_MATCH, etag)
                    .json(&payload)
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_error(
                "events.update",
                status,
                Some(provider_event_id),
            ));
        }
        Self::parse_version("events.update", response).await
    }

    async fn delete_event(
        &self,
        calendar_id: &str,
        provider_event_id: &str,
    ) -> Result<(), AdapterError> {
        let url = format!("{}/{}", self.events_url(calendar_id), provider_event_id);

        let response = self
            .send_with_retry("events.delete", || self.client.delete(&url))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_error("events.delete", status, None));
        }
        Ok(())
    }

    async fn list_changes_since(
        &self,
        calendar_id: &str,
        sync_token: Option<&str>,
    ) -> Result<ChangeSet, AdapterError> {
        let url = self.events_url(calendar_id);
        let mut changes = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let response = self
                .send_with_retry("events.list", || {
                    let mut request = self
                        .client
                        .get(&url)
                        .query(&[("showDeleted", "true"), ("maxResults", LIST_PAGE_SIZE)]);
                    match sync_token {
                        Some(token) => request = request.query(&[("syncToken", token)]),
                        // Full resync: expand nothing extra, just walk every event
                        None => request = request.query(&[("singleEvents", "true")]),
                    }
                    if let Some(token) = &page_token {
                        request = request.query(&[("pageToken", token.as_str())]);
                    }
                    request
                })
                .await?;

            let status = response.status();
            if status == StatusCode::GONE {
                // The provider no longer accepts this sync token
                return Err(AdapterError::InvalidSyncToken);
            }
            if !status.is_success() {
                return Err(classify_error("events.list", status, None));
            }

            let page: GoogleEventsPage = response.json().await.map_err(|e| {
                AdapterError::permanent(format!("events.list: invalid response body: {e}"))
            })?;

            changes.extend(page.items.into_iter().filter_map(from_google));

            match (page.next_page_token, page.next_sync_token) {
                (Some(next), _) => page_token = Some(next),
                (None, Some(next_sync_token)) => {
                    return Ok(ChangeSet {
                        changes,
                        next_sync_token,
                    });
                }
                (None, None) => {
                    return Err(AdapterError::permanent(
                        "events.list: final page missing nextSyncToken",
                    ));
                }
            }
        }
    }

    async fn watch(
        &self,
        calendar_id: &str,
        channel_id: &str,
        webhook_url: &str,
        ttl: Duration,
    ) -> Result<WatchResult, AdapterError> {
        let url = format!("{}/watch", self.events_url(calendar_id));
        let payload = GoogleChannelRequest {
            id: channel_id.to_string(),
            channel_type: "web_hook".to_string(),
            address: webhook_url.to_string(),
            params: GoogleChannelParams {
                ttl: ttl.as_secs().to_string(),
            },
        };

        let response = self
            .send_with_retry("events.watch", || self.client.post(&url).json(&payload))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_error("events.watch", status, None));
        }

        let channel: GoogleChannel = response.json().await.map_err(|e| {
            AdapterError::permanent(format!("events.watch: invalid response body: {e}"))
        })?;
        let expiration = parse_expiration(channel.expiration.as_deref())?;

        Ok(WatchResult {
            resource_id: channel.resource_id,
            expiration,
        })
    }

    async fn stop_watch(&self, channel_id: &str, resource_id: &str) -> Result<(), AdapterError> {
        let url = format!("{}/channels/stop", self.base_url);
        let payload = GoogleChannel {
            id: channel_id.to_string(),
            resource_id: resource_id.to_string(),
            expiration: None,
        };

        let response = self
            .send_with_retry("channels.stop", || self.client.post(&url).json(&payload))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_error("channels.stop", status, None));
        }
        Ok(())
    }
}

impl std::fmt::Debug for GoogleCalendarClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleCalendarClient")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Transient statuses worth another attempt
pub(crate) fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

/// Map a terminal non-success status onto the adapter error taxonomy
pub(crate) fn classify_error(
    op: &str,
    status: StatusCode,
    provider_event_id: Option<&str>,
) -> AdapterError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => {
            AdapterError::not_found(format!("{op}: HTTP {status}"))
        }
        StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => AdapterError::Conflict {
            provider_event_id: provider_event_id.unwrap_or_default().to_string(),
        },
        _ => AdapterError::permanent(format!("{op}: HTTP {status}")),
    }
}

fn parse_expiration(raw: Option<&str>) -> Result<DateTime<Utc>, AdapterError> {
    let millis: i64 = raw
        .ok_or_else(|| AdapterError::permanent("events.watch: response missing expiration"))?
        .parse()
        .map_err(|_| AdapterError::permanent("events.watch: malformed expiration"))?;

    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| AdapterError::permanent("events.watch: expiration out of range"))
}
