//! Push stream task: open, decode, merge, reconnect forever.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use toolsync_core::{ReconnectPolicy, ReconnectTracker, ResourceUpdate};
use tracing::{debug, info, warn};

use crate::backend::{PushEvent, PushSource};
use crate::channel::{ChannelState, GatedSink};
use crate::error::TransportError;

/// Why a single stream session stopped.
enum SessionEnd {
    Failed(TransportError),
    /// The sink gate closed; the channel is being torn down.
    GateClosed,
}

pub(crate) async fn run_push<S: PushSource>(
    source: Arc<S>,
    sink: GatedSink,
    policy: ReconnectPolicy,
    state: watch::Sender<ChannelState>,
    cancel: CancellationToken,
) {
    let mut tracker = ReconnectTracker::new(policy);

    loop {
        let end = tokio::select! {
            _ = cancel.cancelled() => break,
            end = session(&*source, &sink, &mut tracker, &state, &cancel) => end,
        };

        let err = match end {
            SessionEnd::GateClosed => break,
            SessionEnd::Failed(err) => err,
        };
        let delay = tracker.record_failure();
        let attempt = tracker.attempt();
        warn!(
            error = %err,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "push stream lost, scheduling reconnect"
        );
        publish(&state, &cancel, ChannelState::Reconnecting { attempt });

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    debug!("push task stopped");
}

async fn session<S: PushSource>(
    source: &S,
    sink: &GatedSink,
    tracker: &mut ReconnectTracker,
    state: &watch::Sender<ChannelState>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let mut stream = match source.open() {
        Ok(stream) => stream,
        Err(err) => return SessionEnd::Failed(err),
    };

    while let Some(item) = stream.next().await {
        match item {
            Ok(PushEvent::Opened) => {
                tracker.record_success();
                publish(state, cancel, ChannelState::Connected);
                info!("push stream connected");
            }
            Ok(PushEvent::Message { event, data }) => {
                match ResourceUpdate::from_push(&event, &data) {
                    Ok(update) => {
                        if !sink.ingest(update) {
                            return SessionEnd::GateClosed;
                        }
                    }
                    Err(err) => warn!(event = %event, error = %err, "dropping push update"),
                }
            }
            Err(err) => return SessionEnd::Failed(err),
        }
    }
    SessionEnd::Failed(TransportError::StreamEnded)
}

/// A torn-down connection must not overwrite `Closed`.
fn publish(state: &watch::Sender<ChannelState>, cancel: &CancellationToken, next: ChannelState) {
    state.send_if_modified(|current| {
        if cancel.is_cancelled() || *current == ChannelState::Closed || *current == next {
            return false;
        }
        *current = next;
        true
    });
}
