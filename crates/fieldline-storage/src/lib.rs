// Postgres storage layer with sqlx
//
// This crate provides database implementations for core traits:
// - DbChannelRegistry: implements ChannelRegistry over push_channels
// - DbSyncCursorStore: implements SyncCursorStore over sync_cursors
// - DbEventMirror: implements EventMirror over calendar_events

pub mod channel_registry;
pub mod cursor_store;
pub mod event_mirror;
pub mod models;
pub mod repositories;

pub use channel_registry::{create_db_channel_registry, DbChannelRegistry};
pub use cursor_store::{create_db_cursor_store, DbSyncCursorStore};
pub use event_mirror::{create_db_event_mirror, DbEventMirror};
pub use models::*;
pub use repositories::*;
