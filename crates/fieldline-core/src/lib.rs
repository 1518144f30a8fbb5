// Calendar Sync Abstractions
//
// This crate provides the DB-agnostic core of Fieldline's calendar sync
// engine: the unified event model, the entity mapper, the provider client
// boundary, the durable-store traits, and the cost rollup engine.
//
// Key design decisions:
// - Uses traits (ChannelRegistry, SyncCursorStore, EventMirror) for pluggable backends
// - No provider wire type crosses the CalendarClient boundary
// - Configuration via SyncConfig, constructed once and injected (no globals)
// - Error handling distinguishes retryable, permanent, and conflict outcomes
// - Push-only entity types reject inbound application with a typed error

// Domain entity types
// These are DB-agnostic types used by API, worker, and storage crates
pub mod assignment;
pub mod channel;
pub mod event;
pub mod scope;

pub mod client;
pub mod config;
pub mod error;
pub mod mapper;
pub mod rollup;
pub mod traits;

// In-memory implementations for examples and testing
pub mod memory;

// Re-exports for convenience
pub use assignment::CalendarAssignment;
pub use channel::{PushChannel, SyncCursor};
pub use client::{CalendarClient, ChangeSet, EventVersion, ProviderEvent, WatchResult};
pub use config::{RetryPolicy, SyncConfig};
pub use error::{AdapterError, Result, SyncError};
pub use event::{AssigneeType, CalendarEvent, EntityType};
pub use mapper::ScheduleEntity;
pub use rollup::{AssigneeRollup, DateRange, RollupEngine, RollupSummary};
pub use scope::{AccessLevel, CalendarAccess, CalendarScope, ScopeKind};
