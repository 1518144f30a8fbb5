// Provider test double
//
// A scriptable CalendarClient for unit tests: changes are keyed by sync
// token, single-shot failures can be queued per operation, and every watch
// and stop is recorded for assertions. Holds the same place in tests that
// the in-memory stores in fieldline-core::memory do.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use fieldline_core::{
    AdapterError, CalendarClient, CalendarEvent, ChangeSet, EventVersion, WatchResult,
};

/// Scriptable failure outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Retryable,
    NotFound,
    InvalidToken,
    Conflict,
    Permanent,
}

impl FailureKind {
    fn into_error(self) -> AdapterError {
        match self {
            FailureKind::Retryable => AdapterError::retryable("scripted transient failure"),
            FailureKind::NotFound => AdapterError::not_found("scripted missing resource"),
            FailureKind::InvalidToken => AdapterError::InvalidSyncToken,
            FailureKind::Conflict => AdapterError::Conflict {
                provider_event_id: "scripted".to_string(),
            },
            FailureKind::Permanent => AdapterError::permanent("scripted permanent failure"),
        }
    }
}

#[derive(Default)]
struct FakeState {
    next_event_seq: u32,
    fail_create: Option<FailureKind>,
    fail_update: Option<FailureKind>,
    fail_delete: Option<FailureKind>,
    fail_watch: Option<FailureKind>,
    fail_stop: Option<FailureKind>,
    changes: HashMap<Option<String>, Result<ChangeSet, FailureKind>>,
    watches: Vec<(String, String)>,
    stops: Vec<(String, String)>,
    watch_expiration: Option<DateTime<Utc>>,
}

/// In-memory CalendarClient fake
#[derive(Clone, Default)]
pub struct FakeCalendarClient {
    state: Arc<Mutex<FakeState>>,
}

impl FakeCalendarClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the change set returned for a given sync token
    pub async fn script_changes(&self, token: Option<&str>, result: Result<ChangeSet, FailureKind>) {
        self.state
            .lock()
            .await
            .changes
            .insert(token.map(str::to_string), result);
    }

    pub async fn fail_next_create(&self, kind: FailureKind) {
        self.state.lock().await.fail_create = Some(kind);
    }

    pub async fn fail_next_update(&self, kind: FailureKind) {
        self.state.lock().await.fail_update = Some(kind);
    }

    pub async fn fail_next_delete(&self, kind: FailureKind) {
        self.state.lock().await.fail_delete = Some(kind);
    }

    pub async fn fail_next_watch(&self, kind: FailureKind) {
        self.state.lock().await.fail_watch = Some(kind);
    }

    pub async fn fail_next_stop(&self, kind: FailureKind) {
        self.state.lock().await.fail_stop = Some(kind);
    }

    /// Expiration reported for subsequent watch calls
    pub async fn set_watch_expiration(&self, expiration: DateTime<Utc>) {
        self.state.lock().await.watch_expiration = Some(expiration);
    }

    /// (calendar_id, channel_id) pairs watched so far
    pub async fn watches(&self) -> Vec<(String, String)> {
        self.state.lock().await.watches.clone()
    }

    /// (channel_id, resource_id) pairs stopped so far
    pub async fn stops(&self) -> Vec<(String, String)> {
        self.state.lock().await.stops.clone()
    }
}

#[async_trait]
impl CalendarClient for FakeCalendarClient {
    async fn create_event(
        &self,
        _calendar_id: &str,
        _event: &CalendarEvent,
    ) -> Result<EventVersion, AdapterError> {
        let mut state = self.state.lock().await;
        if let Some(kind) = state.fail_create.take() {
            return Err(kind.into_error());
        }
        state.next_event_seq += 1;
        Ok(EventVersion {
            provider_event_id: format!("gev-{}", state.next_event_seq),
            etag: "\"etag-1\"".to_string(),
        })
    }

    async fn update_event(
        &self,
        _calendar_id: &str,
        event: &CalendarEvent,
    ) -> Result<EventVersion, AdapterError> {
        let mut state = self.state.lock().await;
        if let Some(kind) = state.fail_update.take() {
            return Err(kind.into_error());
        }
        let provider_event_id = event
            .provider_event_id
            .clone()
            .ok_or_else(|| AdapterError::permanent("update of never-pushed event"))?;
        Ok(EventVersion {
            provider_event_id,
            etag: "\"etag-next\"".to_string(),
        })
    }

    async fn delete_event(
        &self,
        _calendar_id: &str,
        _provider_event_id: &str,
    ) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        if let Some(kind) = state.fail_delete.take() {
            return Err(kind.into_error());
        }
        Ok(())
    }

    async fn list_changes_since(
        &self,
        _calendar_id: &str,
        sync_token: Option<&str>,
    ) -> Result<ChangeSet, AdapterError> {
        let state = self.state.lock().await;
        match state.changes.get(&sync_token.map(str::to_string)) {
            Some(Ok(change_set)) => Ok(change_set.clone()),
            Some(Err(kind)) => Err(kind.into_error()),
            None => Ok(ChangeSet {
                changes: vec![],
                next_sync_token: sync_token.unwrap_or("tok-initial").to_string(),
            }),
        }
    }

    async fn watch(
        &self,
        calendar_id: &str,
        channel_id: &str,
        _webhook_url: &str,
        _ttl: Duration,
    ) -> Result<WatchResult, AdapterError> {
        let mut state = self.state.lock().await;
        if let Some(kind) = state.fail_watch.take() {
            return Err(kind.into_error());
        }
        state
            .watches
            .push((calendar_id.to_string(), channel_id.to_string()));
        Ok(WatchResult {
            resource_id: format!("res-{channel_id}"),
            expiration: state
                .watch_expiration
                .unwrap_or_else(|| Utc::now() + ChronoDuration::days(7)),
        })
    }

    async fn stop_watch(&self, channel_id: &str, resource_id: &str) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        if let Some(kind) = state.fail_stop.take() {
            return Err(kind.into_error());
        }
        state
            .stops
            .push((channel_id.to_string(), resource_id.to_string()));
        Ok(())
    }
}
