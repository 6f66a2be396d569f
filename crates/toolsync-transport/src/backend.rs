//! Seams between the sync layer and the remote service.
//!
//! [`Backend`] covers request/response calls (collection fetches and
//! mutations); [`PushSource`] opens the server-push stream. Both are traits
//! so the channel and the coordinator can run against scripted fakes.

use std::future::Future;

use futures_util::stream::BoxStream;
use toolsync_core::{MutationRequest, ResourceKind};

use crate::error::TransportError;

/// Request/response access to the REST API.
pub trait Backend: Send + Sync + 'static {
    /// Fetch the raw JSON body of one collection (`GET /status`, `/tools`, ...).
    fn fetch(
        &self,
        kind: ResourceKind,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;

    /// Submit one mutation. Single attempt; no retry.
    fn submit(
        &self,
        request: &MutationRequest,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// One frame from the push stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// Connection established (HTTP response headers received).
    Opened,
    /// A server-sent event. `event` is empty or `"message"` for unnamed events.
    Message { event: String, data: String },
}

pub type PushStream = BoxStream<'static, Result<PushEvent, TransportError>>;

/// Opens the long-lived push stream.
///
/// The returned stream must not retry internally; reconnect scheduling
/// belongs to the channel. A stream that yields `None` is treated as ended.
pub trait PushSource: Send + Sync + 'static {
    fn open(&self) -> Result<PushStream, TransportError>;
}
