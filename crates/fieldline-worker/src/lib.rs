// Sync engine worker
//
// Home of the two moving parts of the calendar sync engine:
// - SyncService: webhook-triggered pull sync and outbound push
// - RenewalService: the periodic push-channel renewal pass
//
// The API crate drives SyncService; the fieldline-renewal binary in this
// crate runs RenewalService on a cron schedule.

pub mod renewal;
pub mod sync;

// Provider test double for unit tests across crates
pub mod testing;

pub use renewal::{RenewalService, RenewalSummary};
pub use sync::{PullSummary, PushOutcome, SyncService, SyncTrigger};
