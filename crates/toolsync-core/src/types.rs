use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SyncError;

pub type ToolId = String;
pub type JobId = String;
pub type UserId = String;

// ─── Station ──────────────────────────────────────────────────────

/// A robot station name such as `"Station A"`, or the literal `"Unknown"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Station(String);

impl Station {
    pub const UNKNOWN: &'static str = "Unknown";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_owned())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short label: `"Station A"` → `"A"`, `"Unknown"` → `"?"`.
    pub fn letter(&self) -> &str {
        if self.is_unknown() {
            return "?";
        }
        self.0.split_whitespace().last().unwrap_or(&self.0)
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Robot Status ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotStatus {
    #[serde(default)]
    pub is_connected: bool,
    #[serde(default = "Station::unknown")]
    pub current_station: Station,
    #[serde(default)]
    pub is_traveling: bool,
    #[serde(default)]
    pub destination_station: Option<Station>,
    pub last_checked: DateTime<Utc>,
}

impl RobotStatus {
    /// `is_traveling` holds exactly when a destination is set.
    pub fn validate(&self) -> Result<(), SyncError> {
        match (self.is_traveling, &self.destination_station) {
            (true, None) => Err(SyncError::malformed(
                "status: traveling without a destination station",
            )),
            (false, Some(dest)) => Err(SyncError::malformed(format!(
                "status: destination {dest} set while not traveling"
            ))),
            _ => Ok(()),
        }
    }

    /// Station shown to the user: the destination while traveling.
    pub fn displayed_station(&self) -> &Station {
        match (&self.destination_station, self.is_traveling) {
            (Some(dest), true) => dest,
            _ => &self.current_station,
        }
    }
}

// ─── Entity References ────────────────────────────────────────────

/// Reference to another entity: either a bare id, or an object the backend
/// populated in place (`{ "_id": ..., "name": ... }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    Id(String),
    Populated {
        #[serde(default, alias = "_id")]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
}

impl EntityRef {
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Id(id) => Some(id),
            Self::Populated { id, .. } => id.as_deref(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Id(_) => None,
            Self::Populated { name, .. } => name.as_deref(),
        }
    }
}

// ─── Tools & Jobs ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolStatus {
    Available,
    #[serde(alias = "Checked Out", alias = "checkedOut")]
    CheckedOut,
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => f.write_str("Available"),
            Self::CheckedOut => f.write_str("Checked Out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    #[serde(alias = "_id")]
    pub id: ToolId,
    pub name: String,
    pub status: ToolStatus,
    #[serde(default)]
    pub checked_out_by: Option<EntityRef>,
}

impl Tool {
    /// `CheckedOut` holds exactly when `checked_out_by` is set.
    pub fn validate(&self) -> Result<(), SyncError> {
        match (self.status, &self.checked_out_by) {
            (ToolStatus::CheckedOut, None) => Err(SyncError::malformed(format!(
                "tool {}: checked out without a holder",
                self.id
            ))),
            (ToolStatus::Available, Some(_)) => Err(SyncError::malformed(format!(
                "tool {}: available but has a holder",
                self.id
            ))),
            _ => Ok(()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == ToolStatus::Available
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(alias = "_id")]
    pub id: JobId,
    pub name: String,
    #[serde(default)]
    pub tools: Vec<EntityRef>,
}

// ─── History ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    #[serde(default, alias = "toolId")]
    pub tool: Option<EntityRef>,
    #[serde(default, alias = "userId")]
    pub user: Option<EntityRef>,
    #[serde(default)]
    pub check_out: Option<DateTime<Utc>>,
    #[serde(default)]
    pub check_in: Option<DateTime<Utc>>,
}

impl HistoryRecord {
    pub const UNKNOWN_TOOL: &'static str = "Unknown Tool";
    pub const UNKNOWN_USER: &'static str = "Unknown User";

    /// Display ordering key: most recent activity.
    pub fn activity_key(&self) -> Option<DateTime<Utc>> {
        self.check_in.or(self.check_out)
    }

    pub fn tool_name(&self) -> &str {
        self.tool
            .as_ref()
            .and_then(EntityRef::name)
            .unwrap_or(Self::UNKNOWN_TOOL)
    }

    pub fn user_name(&self) -> &str {
        self.user
            .as_ref()
            .and_then(EntityRef::name)
            .unwrap_or(Self::UNKNOWN_USER)
    }
}

// ─── Tests ────────────────────────────────────────────────────────
