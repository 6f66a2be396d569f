//! Mutation guards, request building, and the per-target phase ledger.
//!
//! Pure and deterministic. The async coordinator that actually talks to
//! the backend lives in the runtime crate and drives these pieces:
//!
//! ```text
//! Idle ──request──▶ Confirming ──confirm──▶ Submitting ──▶ Succeeded
//!   ▲                   │                        │
//!   └──────cancel───────┘                        └──failed──▶ Idle
//! ```
//!
//! No mutation is ever applied to the cache here. A successful submit is
//! reflected only once the next authoritative merge arrives.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::cache::CacheSnapshot;
use crate::error::SyncError;
use crate::types::{JobId, Station, ToolId, ToolStatus, UserId};

// ─── Intent ───────────────────────────────────────────────────────

/// What a mutation acts on. Two mutations with the same target never
/// submit concurrently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MutationTarget {
    Tool(ToolId),
    Job(JobId),
    Robot,
}

/// A user-initiated state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    CheckoutTool { tool_id: ToolId },
    CheckinTool { tool_id: ToolId },
    CheckoutJob { job_id: JobId },
    Travel { destination: Station },
    EmergencyStop,
}

impl Intent {
    pub fn target(&self) -> MutationTarget {
        match self {
            Self::CheckoutTool { tool_id } | Self::CheckinTool { tool_id } => {
                MutationTarget::Tool(tool_id.clone())
            }
            Self::CheckoutJob { job_id } => MutationTarget::Job(job_id.clone()),
            Self::Travel { .. } | Self::EmergencyStop => MutationTarget::Robot,
        }
    }

    /// Emergency stop is the only intent dispatched without a confirmation step.
    pub fn requires_confirmation(&self) -> bool {
        !matches!(self, Self::EmergencyStop)
    }

    /// Tool and job requests are recorded against the signed-in user.
    pub fn acts_for_user(&self) -> bool {
        matches!(
            self,
            Self::CheckoutTool { .. } | Self::CheckinTool { .. } | Self::CheckoutJob { .. }
        )
    }

    /// Evaluate client-side guards against `snapshot`.
    ///
    /// These are round-trip savers only; the backend stays the final arbiter.
    pub fn check(&self, snapshot: &CacheSnapshot) -> Result<(), SyncError> {
        match self {
            Self::CheckoutTool { tool_id } => {
                require_connected(snapshot)?;
                match snapshot.tool(tool_id) {
                    Some(tool) if tool.is_available() => Ok(()),
                    Some(_) => Err(SyncError::PreconditionFailed {
                        reason: "tool is already checked out".into(),
                        unavailable: vec![tool_id.clone()],
                    }),
                    None => Err(SyncError::PreconditionFailed {
                        reason: "unknown tool".into(),
                        unavailable: vec![tool_id.clone()],
                    }),
                }
            }
            Self::CheckinTool { tool_id } => {
                require_connected(snapshot)?;
                match snapshot.tool(tool_id).map(|t| t.status) {
                    Some(ToolStatus::CheckedOut) => Ok(()),
                    Some(ToolStatus::Available) => {
                        Err(SyncError::NoOp(format!("tool {tool_id} is not checked out")))
                    }
                    None => Err(SyncError::PreconditionFailed {
                        reason: "unknown tool".into(),
                        unavailable: vec![tool_id.clone()],
                    }),
                }
            }
            Self::CheckoutJob { job_id } => {
                let Some(job) = snapshot.job(job_id) else {
                    return Err(SyncError::PreconditionFailed {
                        reason: format!("unknown job {job_id}"),
                        unavailable: Vec::new(),
                    });
                };
                let unavailable = snapshot.unavailable_tools(job);
                if unavailable.is_empty() {
                    Ok(())
                } else {
                    Err(SyncError::PreconditionFailed {
                        reason: format!("job {job_id} has unavailable tools"),
                        unavailable,
                    })
                }
            }
            Self::Travel { destination } => {
                let status = require_connected(snapshot)?;
                if status.current_station == *destination {
                    return Err(SyncError::NoOp(format!(
                        "robot is already at {destination}"
                    )));
                }
                Ok(())
            }
            Self::EmergencyStop => Ok(()),
        }
    }

    /// Build the backend request. Call after [`Self::check`] succeeded.
    pub fn to_request(
        &self,
        snapshot: &CacheSnapshot,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<MutationRequest, SyncError> {
        let request = match self {
            Self::CheckoutTool { tool_id } => MutationRequest::ToolCheckout {
                tool_id: tool_id.clone(),
                user_id: user_id.to_owned(),
                timestamp: now,
            },
            Self::CheckinTool { tool_id } => MutationRequest::ToolCheckin {
                tool_id: tool_id.clone(),
                user_id: user_id.to_owned(),
                timestamp: now,
            },
            Self::CheckoutJob { job_id } => MutationRequest::JobCheckout {
                job_id: job_id.clone(),
                user_id: user_id.to_owned(),
                timestamp: now,
            },
            Self::Travel { destination } => {
                let status = require_connected(snapshot)?;
                MutationRequest::UpdateStation {
                    current_station: status.current_station.clone(),
                    destination_station: destination.clone(),
                }
            }
            Self::EmergencyStop => MutationRequest::ResetTravel,
        };
        Ok(request)
    }
}

fn require_connected(snapshot: &CacheSnapshot) -> Result<&crate::types::RobotStatus, SyncError> {
    match &snapshot.status {
        Some(status) if status.is_connected => Ok(status),
        _ => Err(SyncError::NotConnected),
    }
}

// ─── Backend Request ──────────────────────────────────────────────

/// A single backend call. Serialized exactly as the REST API expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRequest {
    ToolCheckout {
        tool_id: ToolId,
        user_id: UserId,
        timestamp: DateTime<Utc>,
    },
    ToolCheckin {
        tool_id: ToolId,
        user_id: UserId,
        timestamp: DateTime<Utc>,
    },
    JobCheckout {
        job_id: JobId,
        user_id: UserId,
        timestamp: DateTime<Utc>,
    },
    UpdateStation {
        current_station: Station,
        destination_station: Station,
    },
    /// Emergency stop: clears travel and marks the position unknown.
    ResetTravel,
}

impl MutationRequest {
    pub fn path(&self) -> &'static str {
        match self {
            Self::ToolCheckout { .. } => "/tools/checkout",
            Self::ToolCheckin { .. } => "/tools/checkin",
            Self::JobCheckout { .. } => "/jobs/checkout",
            Self::UpdateStation { .. } => "/status/updateStation",
            Self::ResetTravel => "/status/updateTraveling",
        }
    }

    pub fn body(&self) -> Value {
        let ts = |t: &DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::Millis, true);
        match self {
            Self::ToolCheckout {
                tool_id,
                user_id,
                timestamp,
            }
            | Self::ToolCheckin {
                tool_id,
                user_id,
                timestamp,
            } => json!({
                "toolId": tool_id,
                "userId": user_id,
                "timestamp": ts(timestamp),
            }),
            Self::JobCheckout {
                job_id,
                user_id,
                timestamp,
            } => json!({
                "jobId": job_id,
                "userId": user_id,
                "timestamp": ts(timestamp),
            }),
            Self::UpdateStation {
                current_station,
                destination_station,
            } => json!({
                "currentStation": current_station,
                "isTraveling": true,
                "destinationStation": destination_station,
            }),
            Self::ResetTravel => json!({
                "isTraveling": false,
                "destinationStation": null,
                "currentStation": Station::UNKNOWN,
            }),
        }
    }
}

// ─── Phase Ledger ─────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationPhase {
    #[default]
    Idle,
    /// Guards passed; waiting for explicit user confirmation.
    Confirming,
    /// Backend request in flight.
    Submitting,
    /// Backend accepted; cache will reflect it on the next merge.
    Succeeded,
}

/// Tracks the phase of every mutation target. Failed submissions return
/// their target to `Idle`.
#[derive(Debug, Default)]
pub struct MutationLedger {
    phases: HashMap<MutationTarget, MutationPhase>,
}

impl MutationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self, target: &MutationTarget) -> MutationPhase {
        self.phases.get(target).copied().unwrap_or_default()
    }

    /// Enter `Confirming`. Allowed from any phase but `Submitting`.
    pub fn begin_confirm(&mut self, target: &MutationTarget) -> Result<(), SyncError> {
        self.reject_in_flight(target)?;
        self.phases.insert(target.clone(), MutationPhase::Confirming);
        Ok(())
    }

    /// Abandon a pending confirmation.
    pub fn cancel(&mut self, target: &MutationTarget) {
        if self.phase(target) == MutationPhase::Confirming {
            self.phases.remove(target);
        }
    }

    /// Enter `Submitting`. Rejects a second submit for a target already in flight.
    pub fn begin_submit(&mut self, target: &MutationTarget) -> Result<(), SyncError> {
        self.reject_in_flight(target)?;
        self.phases.insert(target.clone(), MutationPhase::Submitting);
        Ok(())
    }

    pub fn finish(&mut self, target: &MutationTarget, accepted: bool) {
        if accepted {
            self.phases.insert(target.clone(), MutationPhase::Succeeded);
        } else {
            self.phases.remove(target);
        }
    }

    fn reject_in_flight(&self, target: &MutationTarget) -> Result<(), SyncError> {
        if self.phase(target) == MutationPhase::Submitting {
            return Err(SyncError::NoOp(format!(
                "a request for {target:?} is already in flight"
            )));
        }
        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────
