// Calendar scoping and access control types
//
// Scopes bind a calendar to an organization or a single project; access
// rows grant per-employee levels on a calendar. These gate who may enable
// sync or mutate events on a calendar. They are not part of the sync
// protocol itself.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// What a calendar is scoped to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Organization,
    Project,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Organization => "organization",
            ScopeKind::Project => "project",
        }
    }
}

impl From<&str> for ScopeKind {
    fn from(s: &str) -> Self {
        match s {
            "project" => ScopeKind::Project,
            _ => ScopeKind::Organization,
        }
    }
}

/// Per-employee access level on a calendar
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Read,
    Write,
    Admin,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::Admin => "admin",
        }
    }

    /// Whether this level permits mutating events on the calendar
    pub fn can_write(&self) -> bool {
        matches!(self, AccessLevel::Write | AccessLevel::Admin)
    }
}

impl From<&str> for AccessLevel {
    fn from(s: &str) -> Self {
        match s {
            "admin" => AccessLevel::Admin,
            "write" => AccessLevel::Write,
            _ => AccessLevel::Read,
        }
    }
}

/// Binding of a calendar to an organization or project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CalendarScope {
    pub calendar_id: String,
    pub scope_kind: ScopeKind,
    pub scope_id: Uuid,
}

/// An employee's access grant on a calendar
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CalendarAccess {
    pub calendar_id: String,
    pub employee_id: Uuid,
    pub level: AccessLevel,
}
