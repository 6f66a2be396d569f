//! Typed resource updates and their decoding from push frames and poll bodies.
//!
//! Both transport paths funnel through [`ResourceUpdate::decode`], so the
//! invariants checked here hold for everything that reaches the cache.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;
use crate::types::{HistoryRecord, Job, RobotStatus, Tool};

// ─── Resource Kind ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Status,
    Tools,
    Jobs,
    History,
}

impl ResourceKind {
    pub const ALL: [Self; 4] = [Self::Status, Self::Tools, Self::Jobs, Self::History];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Tools => "tools",
            Self::Jobs => "jobs",
            Self::History => "history",
        }
    }

    /// REST collection path relative to the API base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::Status => "/status",
            Self::Tools => "/tools",
            Self::Jobs => "/jobs",
            Self::History => "/history",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status" => Ok(Self::Status),
            "tools" => Ok(Self::Tools),
            "jobs" => Ok(Self::Jobs),
            "history" => Ok(Self::History),
            _ => Err(SyncError::malformed(format!("unknown resource type: {s}"))),
        }
    }
}

// ─── Resource Update ──────────────────────────────────────────────

/// A full-collection replacement for one resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUpdate {
    Status(RobotStatus),
    Tools(Vec<Tool>),
    Jobs(Vec<Job>),
    History(Vec<HistoryRecord>),
}

/// Generic SSE message body: `{ "type": "...", "data": ... }`.
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    data: Value,
}

/// SSE event name used when the server sends an unnamed event.
pub const GENERIC_EVENT: &str = "message";

impl ResourceUpdate {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Status(_) => ResourceKind::Status,
            Self::Tools(_) => ResourceKind::Tools,
            Self::Jobs(_) => ResourceKind::Jobs,
            Self::History(_) => ResourceKind::History,
        }
    }

    /// Decode `data` as the collection for `kind` and check entity invariants.
    pub fn decode(kind: ResourceKind, data: Value) -> Result<Self, SyncError> {
        let bad = |e: serde_json::Error| SyncError::malformed(format!("{kind}: {e}"));
        let update = match kind {
            ResourceKind::Status => {
                let status: RobotStatus = serde_json::from_value(data).map_err(bad)?;
                status.validate()?;
                Self::Status(status)
            }
            ResourceKind::Tools => {
                let tools: Vec<Tool> = serde_json::from_value(data).map_err(bad)?;
                for tool in &tools {
                    tool.validate()?;
                }
                Self::Tools(tools)
            }
            ResourceKind::Jobs => Self::Jobs(serde_json::from_value(data).map_err(bad)?),
            ResourceKind::History => Self::History(serde_json::from_value(data).map_err(bad)?),
        };
        Ok(update)
    }

    /// Decode a poll response body for `kind`.
    pub fn from_body(kind: ResourceKind, body: &str) -> Result<Self, SyncError> {
        let data: Value = serde_json::from_str(body)
            .map_err(|e| SyncError::malformed(format!("{kind}: invalid JSON: {e}")))?;
        Self::decode(kind, data)
    }

    /// Decode a push frame. Supports both framings the server uses:
    /// named events (`event: tools`) carrying the raw collection, and
    /// generic messages carrying a `{type, data}` envelope.
    pub fn from_push(event: &str, data: &str) -> Result<Self, SyncError> {
        let value: Value = serde_json::from_str(data)
            .map_err(|e| SyncError::malformed(format!("event {event:?}: invalid JSON: {e}")))?;

        if event.is_empty() || event == GENERIC_EVENT {
            let envelope: Envelope = serde_json::from_value(value)
                .map_err(|e| SyncError::malformed(format!("message envelope: {e}")))?;
            let kind = envelope.kind.parse::<ResourceKind>()?;
            return Self::decode(kind, envelope.data);
        }

        let kind = event.parse::<ResourceKind>()?;
        Self::decode(kind, value)
    }
}
