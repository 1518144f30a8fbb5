// Channel renewal
//
// Push channels expire; a channel allowed to lapse silently stops webhook
// delivery and degrades the calendar to manual-trigger sync. RenewalService
// runs one pass over channels nearing expiration and replaces each with a
// fresh one. Per-channel failures are isolated: one bad channel never
// aborts the batch, and a failed watch leaves the old registry row in
// place so the calendar stays visible in the stale-channel query.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use fieldline_core::{
    traits::ChannelRegistry, CalendarClient, PushChannel, Result, SyncConfig,
};

/// Counters from one renewal pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenewalSummary {
    pub examined: usize,
    pub renewed: usize,
    pub failed: usize,
    /// Channels already expired with no successor (webhooks dead)
    pub stale: usize,
}

/// Periodic replacement of expiring push channels
pub struct RenewalService {
    client: Arc<dyn CalendarClient>,
    registry: Arc<dyn ChannelRegistry>,
    config: SyncConfig,
}

impl RenewalService {
    pub fn new(
        client: Arc<dyn CalendarClient>,
        registry: Arc<dyn ChannelRegistry>,
        config: SyncConfig,
    ) -> Self {
        Self {
            client,
            registry,
            config,
        }
    }

    /// One renewal pass. Safe to run concurrently with itself: a calendar
    /// renewed by an overlapping pass simply has nothing expiring anymore,
    /// and `replace` is idempotent when the old channel is already gone.
    pub async fn run_once(&self) -> Result<RenewalSummary> {
        let now = Utc::now();
        let threshold = now + ChronoDuration::hours(self.config.renewal_lookahead_hours);
        let expiring = self.registry.expiring_before(threshold).await?;

        let mut summary = RenewalSummary {
            examined: expiring.len(),
            ..RenewalSummary::default()
        };

        for channel in &expiring {
            match self.renew(channel).await {
                Ok(()) => {
                    summary.renewed += 1;
                    tracing::info!(
                        calendar_id = %channel.calendar_id,
                        old_channel = %channel.channel_id,
                        "channel renewed"
                    );
                }
                Err(err) => {
                    summary.failed += 1;
                    tracing::error!(
                        calendar_id = %channel.calendar_id,
                        channel_id = %channel.channel_id,
                        error = %err,
                        "channel renewal failed, old channel left in place"
                    );
                }
            }
        }

        let stale = self.registry.expired_without_successor(Utc::now()).await?;
        summary.stale = stale.len();
        for channel in &stale {
            tracing::warn!(
                calendar_id = %channel.calendar_id,
                channel_id = %channel.channel_id,
                expired_at = %channel.expiration,
                "channel expired with no successor; webhooks are not being delivered"
            );
        }

        Ok(summary)
    }

    /// Make sure a calendar has an active channel, creating one if needed.
    /// Used at startup for newly managed calendars.
    pub async fn ensure_channel(&self, calendar_id: &str) -> Result<PushChannel> {
        if let Some(existing) = self.registry.find_active(calendar_id).await? {
            return Ok(existing);
        }

        let channel_id = Uuid::new_v4().to_string();
        let watch = self
            .client
            .watch(
                calendar_id,
                &channel_id,
                &self.config.webhook_url(),
                self.channel_ttl(),
            )
            .await?;

        let channel = PushChannel {
            channel_id,
            resource_id: watch.resource_id,
            calendar_id: calendar_id.to_string(),
            expiration: watch.expiration,
        };
        self.registry.register(&channel).await?;
        tracing::info!(calendar_id, channel_id = %channel.channel_id, "channel created");
        Ok(channel)
    }

    async fn renew(&self, old: &PushChannel) -> Result<()> {
        // Best-effort stop. A channel the provider already dropped (404, or
        // simply expired) is as good as stopped; anything else is logged
        // and renewal proceeds, since the new watch is what matters.
        match self
            .client
            .stop_watch(&old.channel_id, &old.resource_id)
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                tracing::debug!(channel_id = %old.channel_id, "old channel already gone");
            }
            Err(err) => {
                tracing::warn!(
                    channel_id = %old.channel_id,
                    error = %err,
                    "failed to stop old channel, continuing with renewal"
                );
            }
        }

        let channel_id = Uuid::new_v4().to_string();
        let watch = self
            .client
            .watch(
                &old.calendar_id,
                &channel_id,
                &self.config.webhook_url(),
                self.channel_ttl(),
            )
            .await?;

        let new_channel = PushChannel {
            channel_id,
            resource_id: watch.resource_id,
            calendar_id: old.calendar_id.clone(),
            expiration: watch.expiration,
        };
        self.registry.replace(old, &new_channel).await?;
        Ok(())
    }

    fn channel_ttl(&self) -> Duration {
        Duration::from_secs(self.config.channel_ttl_hours.max(0) as u64 * 3600)
    }
}
