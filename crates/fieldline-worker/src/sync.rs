// Pull-sync and outbound-push orchestration
//
// SyncService is what webhook ingestion triggers and what the event CRUD
// routes call to push local mutations outward. All coordination happens
// through the durable stores; the service itself holds no mutable state,
// so arbitrarily many pulls and pushes may run concurrently.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use fieldline_core::{
    mapper, traits::EventMirror, traits::SyncCursorStore, AdapterError, CalendarClient,
    CalendarEvent, EventVersion, ProviderEvent, Result, ScheduleEntity, SyncError,
};

/// Outcome of an outbound push
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The provider accepted the event; mirror row updated
    Synced(EventVersion),
    /// The provider was unreachable after retries; the local mutation
    /// stands and the push is reconciled by a later pull or manual resync
    Pending,
}

/// Counters from one pull-sync pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullSummary {
    pub applied: usize,
    pub removed: usize,
    pub skipped: usize,
    pub full_resync: bool,
}

/// Anything able to kick off a pull-sync for a calendar.
///
/// Webhook ingestion depends on this rather than on SyncService directly
/// so handler tests can record triggers without a provider or database.
#[async_trait]
pub trait SyncTrigger: Send + Sync {
    async fn trigger_pull(&self, calendar_id: &str);
}

/// Bidirectional sync orchestration for one provider
pub struct SyncService {
    client: Arc<dyn CalendarClient>,
    cursors: Arc<dyn SyncCursorStore>,
    mirror: Arc<dyn EventMirror>,
}

impl SyncService {
    pub fn new(
        client: Arc<dyn CalendarClient>,
        cursors: Arc<dyn SyncCursorStore>,
        mirror: Arc<dyn EventMirror>,
    ) -> Self {
        Self {
            client,
            cursors,
            mirror,
        }
    }

    /// Pull and apply everything that changed since the stored cursor.
    ///
    /// Idempotent under re-delivered or overlapping webhook notifications:
    /// the changes are always resolved from the cursor store, never from
    /// notification payloads, and cursor advancement is last-writer-wins.
    /// An invalid sync token clears the cursor and falls back to a full
    /// resync in the same call.
    pub async fn pull_sync(&self, calendar_id: &str) -> Result<PullSummary> {
        let token = self
            .cursors
            .get(calendar_id)
            .await?
            .and_then(|c| c.next_sync_token);

        match self.pull_once(calendar_id, token.as_deref()).await {
            Err(SyncError::Adapter(AdapterError::InvalidSyncToken)) => {
                tracing::warn!(calendar_id, "sync token rejected by provider, forcing full resync");
                self.cursors.invalidate(calendar_id).await?;
                let mut summary = self.pull_once(calendar_id, None).await?;
                summary.full_resync = true;
                Ok(summary)
            }
            other => other,
        }
    }

    async fn pull_once(&self, calendar_id: &str, token: Option<&str>) -> Result<PullSummary> {
        let change_set = self.client.list_changes_since(calendar_id, token).await?;
        let mut summary = PullSummary::default();

        for change in &change_set.changes {
            if change.cancelled {
                if self
                    .mirror
                    .remove_by_provider_event_id(calendar_id, &change.provider_event_id)
                    .await?
                {
                    summary.removed += 1;
                }
                continue;
            }
            if self.apply_change(calendar_id, change).await? {
                summary.applied += 1;
            } else {
                summary.skipped += 1;
            }
        }

        // Only after the whole batch is durably applied. A partial batch
        // must leave the cursor alone so the next pull sees it again.
        self.cursors
            .advance(calendar_id, &change_set.next_sync_token, Utc::now())
            .await?;

        tracing::info!(
            calendar_id,
            applied = summary.applied,
            removed = summary.removed,
            skipped = summary.skipped,
            "pull sync complete"
        );
        Ok(summary)
    }

    /// Apply one provider change to the mirror. Returns false when the
    /// change targets a push-only entity and is deliberately not applied.
    async fn apply_change(&self, calendar_id: &str, change: &ProviderEvent) -> Result<bool> {
        let existing = self
            .mirror
            .find_by_provider_event_id(calendar_id, &change.provider_event_id)
            .await?;

        match existing {
            Some(row) => {
                if !row.entity_type.supports_inbound() {
                    tracing::warn!(
                        calendar_id,
                        provider_event_id = %change.provider_event_id,
                        entity_type = %row.entity_type,
                        "provider change targets a push-only entity, not applied"
                    );
                    return Ok(false);
                }

                let incoming = incoming_event(&row, change);
                let entity = mapper::entity_snapshot(&row)?;
                let updated_entity = mapper::apply_calendar_event(&incoming, entity)?;

                let mut updated = mapper::to_calendar_event(&updated_entity, calendar_id);
                updated.id = row.id;
                updated.created_at = row.created_at;
                updated.created_by = row.created_by;
                updated.sync_enabled = row.sync_enabled;
                updated.provider_event_id = Some(change.provider_event_id.clone());
                updated.etag = Some(change.etag.clone());
                updated.last_synced_at = Some(Utc::now());

                self.mirror.upsert_remote(&updated).await?;
                Ok(true)
            }
            None => {
                // First seen from the provider side: mirror as an ad-hoc
                // item, unless the event still carries entity metadata from
                // an earlier push (e.g. the local row was lost).
                let entity = ScheduleEntity::AdHoc(mapper::AdHocEvent {
                    id: change.provider_event_id.clone(),
                    title: change.title.clone(),
                    description: change.description.clone(),
                    start: change.start,
                    end: change.end,
                    is_all_day: change.is_all_day,
                    location: change.location.clone(),
                });
                let mut event = mapper::to_calendar_event(&entity, calendar_id);
                if let Some((entity_type, entity_id)) = &change.entity {
                    event.entity_type = *entity_type;
                    event.entity_id = entity_id.clone();
                }
                event.provider_event_id = Some(change.provider_event_id.clone());
                event.etag = Some(change.etag.clone());
                event.last_synced_at = Some(Utc::now());

                self.mirror.upsert_remote(&event).await?;
                Ok(true)
            }
        }
    }

    /// Push a newly created local event to the provider.
    ///
    /// The adapter has already retried transient failures; if they still
    /// exhausted, the event is left pending rather than failing the local
    /// mutation.
    pub async fn push_create(&self, event: &CalendarEvent) -> Result<PushOutcome> {
        match self.client.create_event(&event.calendar_id, event).await {
            Ok(version) => {
                self.mirror
                    .mark_synced(event.id, &version, Utc::now())
                    .await?;
                Ok(PushOutcome::Synced(version))
            }
            Err(err) if err.is_retryable() => {
                tracing::warn!(
                    event_id = %event.id,
                    calendar_id = %event.calendar_id,
                    error = %err,
                    "provider unreachable, event left pending sync"
                );
                Ok(PushOutcome::Pending)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Push a local update to the provider.
    ///
    /// `AdapterError::Conflict` (etag mismatch) is surfaced to the caller
    /// to decide merge/overwrite/skip; it is never resolved silently.
    pub async fn push_update(&self, event: &CalendarEvent) -> Result<PushOutcome> {
        match self.client.update_event(&event.calendar_id, event).await {
            Ok(version) => {
                self.mirror
                    .mark_synced(event.id, &version, Utc::now())
                    .await?;
                Ok(PushOutcome::Synced(version))
            }
            Err(err) if err.is_retryable() => {
                tracing::warn!(
                    event_id = %event.id,
                    calendar_id = %event.calendar_id,
                    error = %err,
                    "provider unreachable, update left pending sync"
                );
                Ok(PushOutcome::Pending)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Delete the provider-side copy of an event. An event the provider
    /// already lost (404/410) counts as deleted.
    pub async fn push_delete(&self, event: &CalendarEvent) -> Result<()> {
        let Some(provider_event_id) = &event.provider_event_id else {
            return Ok(());
        };

        match self
            .client
            .delete_event(&event.calendar_id, provider_event_id)
            .await
        {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl SyncTrigger for SyncService {
    async fn trigger_pull(&self, calendar_id: &str) {
        if let Err(err) = self.pull_sync(calendar_id).await {
            tracing::error!(calendar_id, error = %err, "webhook-triggered pull sync failed");
        }
    }
}

/// Provider change expressed as a calendar event carrying the mirror row's
/// entity identity, ready for the entity mapper.
fn incoming_event(row: &CalendarEvent, change: &ProviderEvent) -> CalendarEvent {
    CalendarEvent {
        title: change.title.clone(),
        description: change.description.clone(),
        start: change.start,
        end: change.end,
        is_all_day: change.is_all_day,
        location: change.location.clone(),
        provider_event_id: Some(change.provider_event_id.clone()),
        etag: Some(change.etag.clone()),
        ..row.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCalendarClient, FailureKind};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use fieldline_core::memory::{InMemoryEventMirror, InMemorySyncCursorStore};
    use fieldline_core::{ChangeSet, EntityType, SyncCursor};
    use uuid::Uuid;

    fn provider_change(id: &str, title: &str) -> ProviderEvent {
        ProviderEvent {
            provider_event_id: id.to_string(),
            etag: format!("\"etag-{id}\""),
            title: title.to_string(),
            description: None,
            start: Utc.with_ymd_and_hms(2024, 6, 3, 7, 0, 0).unwrap(),
            end: None,
            is_all_day: false,
            location: None,
            entity: None,
            cancelled: false,
        }
    }

    fn mirror_row(
        calendar_id: &str,
        provider_event_id: &str,
        entity_type: EntityType,
    ) -> CalendarEvent {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        CalendarEvent {
            id: Uuid::now_v7(),
            title: "Original".to_string(),
            description: None,
            start: Utc.with_ymd_and_hms(2024, 6, 3, 7, 0, 0).unwrap(),
            end: None,
            is_all_day: false,
            location: None,
            entity_type,
            entity_id: "E-1".to_string(),
            assignee_type: None,
            assignee_id: None,
            calendar_id: calendar_id.to_string(),
            provider_event_id: Some(provider_event_id.to_string()),
            etag: Some("\"etag-old\"".to_string()),
            sync_enabled: true,
            last_synced_at: Some(now),
            created_at: now,
            updated_at: now,
            created_by: None,
        }
    }

    fn service(
        client: &FakeCalendarClient,
        cursors: &InMemorySyncCursorStore,
        mirror: &InMemoryEventMirror,
    ) -> SyncService {
        SyncService::new(
            Arc::new(client.clone()),
            Arc::new(cursors.clone()),
            Arc::new(mirror.clone()),
        )
    }

    #[tokio::test]
    async fn pull_applies_changes_and_advances_cursor() {
        let client = FakeCalendarClient::new();
        let cursors = InMemorySyncCursorStore::new();
        let mirror = InMemoryEventMirror::new();
        client.script_changes(
            None,
            Ok(ChangeSet {
                changes: vec![provider_change("gev-1", "Walkthrough")],
                next_sync_token: "tok-1".to_string(),
            }),
        ).await;

        let summary = service(&client, &cursors, &mirror)
            .pull_sync("cal-1")
            .await
            .unwrap();

        assert_eq!(summary.applied, 1);
        let cursor = cursors.get("cal-1").await.unwrap().unwrap();
        assert_eq!(cursor.next_sync_token.as_deref(), Some("tok-1"));
        let mirrored = mirror.all().await;
        assert_eq!(mirrored.len(), 1);
        assert_eq!(mirrored[0].entity_type, EntityType::AdHoc);
        assert_eq!(mirrored[0].provider_event_id.as_deref(), Some("gev-1"));
    }

    #[tokio::test]
    async fn redelivered_webhook_is_idempotent() {
        let client = FakeCalendarClient::new();
        let cursors = InMemorySyncCursorStore::new();
        let mirror = InMemoryEventMirror::new();
        cursors
            .seed(SyncCursor {
                calendar_id: "cal-1".to_string(),
                next_sync_token: Some("tok-1".to_string()),
                last_sync_time: Utc::now() - ChronoDuration::minutes(5),
            })
            .await;
        client.script_changes(
            Some("tok-1"),
            Ok(ChangeSet {
                changes: vec![provider_change("gev-1", "Walkthrough")],
                next_sync_token: "tok-2".to_string(),
            }),
        ).await;
        client.script_changes(
            Some("tok-2"),
            Ok(ChangeSet {
                changes: vec![],
                next_sync_token: "tok-2".to_string(),
            }),
        ).await;

        let sync = service(&client, &cursors, &mirror);
        sync.pull_sync("cal-1").await.unwrap();
        let first_cursor = cursors.get("cal-1").await.unwrap().unwrap();
        let first_mirror = mirror.all().await;

        // Same notification delivered again
        sync.pull_sync("cal-1").await.unwrap();
        let second_cursor = cursors.get("cal-1").await.unwrap().unwrap();
        let second_mirror = mirror.all().await;

        assert_eq!(first_cursor.next_sync_token, second_cursor.next_sync_token);
        assert_eq!(first_mirror.len(), second_mirror.len());
        assert_eq!(first_mirror[0].title, second_mirror[0].title);
    }

    #[tokio::test]
    async fn invalid_token_forces_full_resync() {
        let client = FakeCalendarClient::new();
        let cursors = InMemorySyncCursorStore::new();
        let mirror = InMemoryEventMirror::new();
        cursors
            .seed(SyncCursor {
                calendar_id: "cal-1".to_string(),
                next_sync_token: Some("tok-stale".to_string()),
                last_sync_time: Utc::now() - ChronoDuration::hours(1),
            })
            .await;
        client.script_changes(Some("tok-stale"), Err(FailureKind::InvalidToken)).await;
        client.script_changes(
            None,
            Ok(ChangeSet {
                changes: vec![
                    provider_change("gev-1", "Walkthrough"),
                    provider_change("gev-2", "Inspection"),
                ],
                next_sync_token: "tok-fresh".to_string(),
            }),
        ).await;

        let summary = service(&client, &cursors, &mirror)
            .pull_sync("cal-1")
            .await
            .unwrap();

        assert!(summary.full_resync);
        assert_eq!(summary.applied, 2);
        let cursor = cursors.get("cal-1").await.unwrap().unwrap();
        assert_eq!(cursor.next_sync_token.as_deref(), Some("tok-fresh"));
    }

    #[tokio::test]
    async fn failed_batch_leaves_cursor_alone() {
        struct FailingMirror(InMemoryEventMirror);

        #[async_trait]
        impl EventMirror for FailingMirror {
            async fn find_by_provider_event_id(
                &self,
                calendar_id: &str,
                provider_event_id: &str,
            ) -> Result<Option<CalendarEvent>> {
                self.0
                    .find_by_provider_event_id(calendar_id, provider_event_id)
                    .await
            }

            async fn upsert_remote(&self, _event: &CalendarEvent) -> Result<()> {
                Err(SyncError::storage("disk full"))
            }

            async fn remove_by_provider_event_id(
                &self,
                calendar_id: &str,
                provider_event_id: &str,
            ) -> Result<bool> {
                self.0
                    .remove_by_provider_event_id(calendar_id, provider_event_id)
                    .await
            }

            async fn mark_synced(
                &self,
                id: Uuid,
                version: &EventVersion,
                at: chrono::DateTime<Utc>,
            ) -> Result<()> {
                self.0.mark_synced(id, version, at).await
            }
        }

        let client = FakeCalendarClient::new();
        let cursors = InMemorySyncCursorStore::new();
        cursors
            .seed(SyncCursor {
                calendar_id: "cal-1".to_string(),
                next_sync_token: Some("tok-1".to_string()),
                last_sync_time: Utc::now() - ChronoDuration::minutes(5),
            })
            .await;
        client.script_changes(
            Some("tok-1"),
            Ok(ChangeSet {
                changes: vec![provider_change("gev-1", "Walkthrough")],
                next_sync_token: "tok-2".to_string(),
            }),
        ).await;

        let sync = SyncService::new(
            Arc::new(client.clone()),
            Arc::new(cursors.clone()),
            Arc::new(FailingMirror(InMemoryEventMirror::new())),
        );

        assert!(sync.pull_sync("cal-1").await.is_err());
        let cursor = cursors.get("cal-1").await.unwrap().unwrap();
        assert_eq!(cursor.next_sync_token.as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn stale_advance_does_not_regress_cursor() {
        let cursors = InMemorySyncCursorStore::new();
        let newer = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2024, 6, 1, 11, 0, 0).unwrap();

        assert!(cursors.advance("cal-1", "tok-a", newer).await.unwrap());
        assert!(!cursors.advance("cal-1", "tok-b", older).await.unwrap());

        let cursor = cursors.get("cal-1").await.unwrap().unwrap();
        assert_eq!(cursor.next_sync_token.as_deref(), Some("tok-a"));
        assert_eq!(cursor.last_sync_time, newer);
    }

    #[tokio::test]
    async fn push_only_rows_are_skipped_not_clobbered() {
        let client = FakeCalendarClient::new();
        let cursors = InMemorySyncCursorStore::new();
        let mirror = InMemoryEventMirror::new();
        let row = mirror_row("cal-1", "gev-9", EntityType::TimeEntry);
        mirror.seed(vec![row.clone()]).await;
        client.script_changes(
            None,
            Ok(ChangeSet {
                changes: vec![provider_change("gev-9", "Edited on provider")],
                next_sync_token: "tok-1".to_string(),
            }),
        ).await;

        let summary = service(&client, &cursors, &mirror)
            .pull_sync("cal-1")
            .await
            .unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.applied, 0);
        let kept = mirror.get(row.id).await.unwrap();
        assert_eq!(kept.title, "Original");
    }

    #[tokio::test]
    async fn inbound_change_updates_existing_work_order_row() {
        let client = FakeCalendarClient::new();
        let cursors = InMemorySyncCursorStore::new();
        let mirror = InMemoryEventMirror::new();
        let row = mirror_row("cal-1", "gev-5", EntityType::WorkOrder);
        mirror.seed(vec![row.clone()]).await;
        client.script_changes(
            None,
            Ok(ChangeSet {
                changes: vec![provider_change("gev-5", "Rescheduled pour")],
                next_sync_token: "tok-1".to_string(),
            }),
        ).await;

        service(&client, &cursors, &mirror)
            .pull_sync("cal-1")
            .await
            .unwrap();

        let updated = mirror.get(row.id).await.unwrap();
        assert_eq!(updated.title, "Rescheduled pour");
        assert_eq!(updated.entity_type, EntityType::WorkOrder);
        assert_eq!(updated.entity_id, "E-1");
        assert_eq!(updated.etag.as_deref(), Some("\"etag-gev-5\""));
    }

    #[tokio::test]
    async fn cancelled_change_removes_mirror_row() {
        let client = FakeCalendarClient::new();
        let cursors = InMemorySyncCursorStore::new();
        let mirror = InMemoryEventMirror::new();
        let row = mirror_row("cal-1", "gev-5", EntityType::AdHoc);
        mirror.seed(vec![row.clone()]).await;
        let mut change = provider_change("gev-5", "whatever");
        change.cancelled = true;
        client.script_changes(
            None,
            Ok(ChangeSet {
                changes: vec![change],
                next_sync_token: "tok-1".to_string(),
            }),
        ).await;

        let summary = service(&client, &cursors, &mirror)
            .pull_sync("cal-1")
            .await
            .unwrap();

        assert_eq!(summary.removed, 1);
        assert!(mirror.get(row.id).await.is_none());
    }

    #[tokio::test]
    async fn push_create_records_provider_version() {
        let client = FakeCalendarClient::new();
        let cursors = InMemorySyncCursorStore::new();
        let mirror = InMemoryEventMirror::new();

        // The milestone scenario: all-day event, first push
        let entity = ScheduleEntity::ProjectMilestone(mapper::ProjectMilestone {
            id: "M-1".to_string(),
            name: "Framing complete".to_string(),
            due_date: chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            description: None,
        });
        let event = mapper::to_calendar_event(&entity, "cal-1");
        assert!(event.is_all_day);
        mirror.seed(vec![event.clone()]).await;

        let outcome = service(&client, &cursors, &mirror)
            .push_create(&event)
            .await
            .unwrap();

        assert!(matches!(outcome, PushOutcome::Synced(_)));
        let stored = mirror.get(event.id).await.unwrap();
        assert!(stored.provider_event_id.is_some());
        assert!(stored.last_synced_at.is_some());
    }

    #[tokio::test]
    async fn push_create_leaves_event_pending_when_provider_unreachable() {
        let client = FakeCalendarClient::new();
        client.fail_next_create(FailureKind::Retryable).await;
        let cursors = InMemorySyncCursorStore::new();
        let mirror = InMemoryEventMirror::new();
        let mut event = mirror_row("cal-1", "unused", EntityType::AdHoc);
        event.provider_event_id = None;
        event.etag = None;
        event.last_synced_at = None;
        mirror.seed(vec![event.clone()]).await;

        let outcome = service(&client, &cursors, &mirror)
            .push_create(&event)
            .await
            .unwrap();

        assert_eq!(outcome, PushOutcome::Pending);
        let stored = mirror.get(event.id).await.unwrap();
        assert!(stored.provider_event_id.is_none());
        assert!(stored.last_synced_at.is_none());
    }

    #[tokio::test]
    async fn push_update_surfaces_conflict() {
        let client = FakeCalendarClient::new();
        client.fail_next_update(FailureKind::Conflict).await;
        let cursors = InMemorySyncCursorStore::new();
        let mirror = InMemoryEventMirror::new();
        let event = mirror_row("cal-1", "gev-5", EntityType::WorkOrder);

        let err = service(&client, &cursors, &mirror)
            .push_update(&event)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Adapter(AdapterError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn push_delete_tolerates_already_gone_events() {
        let client = FakeCalendarClient::new();
        client.fail_next_delete(FailureKind::NotFound).await;
        let cursors = InMemorySyncCursorStore::new();
        let mirror = InMemoryEventMirror::new();
        let event = mirror_row("cal-1", "gev-5", EntityType::WorkOrder);

        service(&client, &cursors, &mirror)
            .push_delete(&event)
            .await
            .unwrap();
    }
}
