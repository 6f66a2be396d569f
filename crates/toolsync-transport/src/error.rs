//! Error types for the transport boundary.

use thiserror::Error;
use toolsync_core::SyncError;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {path} returned HTTP {status}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
    },

    #[error("event stream error: {0}")]
    Stream(String),

    #[error("event stream ended")]
    StreamEnded,
}

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        SyncError::TransportFailure(err.to_string())
    }
}
