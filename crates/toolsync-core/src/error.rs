//! Error types shared by every layer of the sync client.

use thiserror::Error;

/// Discriminant of [`SyncError`], for callers that branch on the kind only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotConnected,
    NoOp,
    PreconditionFailed,
    TransportFailure,
    MalformedUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Robot reported offline. No backend call was made.
    #[error("robot is not connected")]
    NotConnected,

    /// The request would not change anything.
    #[error("nothing to do: {0}")]
    NoOp(String),

    /// A client-side check against the current snapshot failed.
    #[error("{reason}: [{}]", .unavailable.join(", "))]
    PreconditionFailed {
        reason: String,
        unavailable: Vec<String>,
    },

    /// Network or backend call failed. Never retried automatically.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// Inbound push/poll payload could not be decoded or violated an invariant.
    #[error("malformed update: {0}")]
    MalformedUpdate(String),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotConnected => ErrorKind::NotConnected,
            Self::NoOp(_) => ErrorKind::NoOp,
            Self::PreconditionFailed { .. } => ErrorKind::PreconditionFailed,
            Self::TransportFailure(_) => ErrorKind::TransportFailure,
            Self::MalformedUpdate(_) => ErrorKind::MalformedUpdate,
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedUpdate(msg.into())
    }
}

/// A tunable outside its accepted range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingError {
    #[error("{0} must be positive")]
    NotPositive(&'static str),

    #[error("reconnect.multiplier must be >= 1.0, got {0}")]
    ShrinkingBackoff(f64),

    #[error("reconnect.max_delay_ms is below initial_delay_ms")]
    CapBelowInitial,
}
