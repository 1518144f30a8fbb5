// Push channel and sync cursor domain types
//
// Both are owned by the sync engine itself, keyed by calendar id, and
// independent of any single event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A provider-side push-notification subscription.
///
/// At most one active (non-expired) channel per calendar from this system's
/// perspective. Multiple rows may exist transiently during renewal; webhook
/// validation considers only what the registry currently holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushChannel {
    /// Opaque token chosen by us at watch time
    pub channel_id: String,
    /// Opaque token issued by the provider at watch time
    pub resource_id: String,
    pub calendar_id: String,
    pub expiration: DateTime<Utc>,
}

impl PushChannel {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }
}

/// Incremental sync position for one calendar.
///
/// `next_sync_token == None` means a full resync is required on the next
/// pull. The token is cleared whenever the provider rejects it as expired.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncCursor {
    pub calendar_id: String,
    pub next_sync_token: Option<String>,
    pub last_sync_time: DateTime<Utc>,
}
