//! Fixed-interval poll fallback. Runs alongside the push stream regardless
//! of push health and bounds staleness when push is degraded.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use toolsync_core::{ResourceKind, ResourceUpdate, SettingError};
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::channel::GatedSink;

/// Per-collection poll intervals in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub status_ms: u64,
    pub tools_ms: u64,
    pub jobs_ms: u64,
    pub history_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            status_ms: 1_000,
            tools_ms: 5_000,
            jobs_ms: 5_000,
            history_ms: 5_000,
        }
    }
}

impl PollConfig {
    pub fn interval(&self, kind: ResourceKind) -> Duration {
        let ms = match kind {
            ResourceKind::Status => self.status_ms,
            ResourceKind::Tools => self.tools_ms,
            ResourceKind::Jobs => self.jobs_ms,
            ResourceKind::History => self.history_ms,
        };
        Duration::from_millis(ms)
    }

    pub fn validate(&self) -> Result<(), SettingError> {
        for kind in ResourceKind::ALL {
            if self.interval(kind).is_zero() {
                return Err(SettingError::NotPositive(field_name(kind)));
            }
        }
        Ok(())
    }
}

fn field_name(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Status => "poll.status_ms",
        ResourceKind::Tools => "poll.tools_ms",
        ResourceKind::Jobs => "poll.jobs_ms",
        ResourceKind::History => "poll.history_ms",
    }
}

/// One task per collection, so a slow or hung fetch only delays its own kind.
pub(crate) fn spawn_polls<B: Backend>(
    backend: &Arc<B>,
    sink: &GatedSink,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    ResourceKind::ALL
        .into_iter()
        .map(|kind| {
            tokio::spawn(run_poll(
                Arc::clone(backend),
                sink.clone(),
                kind,
                config.interval(kind),
                cancel.clone(),
            ))
        })
        .collect()
}

/// Poll `kind` every `period`. The first tick fires immediately, so a fresh
/// channel fills the cache at once.
async fn run_poll<B: Backend>(
    backend: Arc<B>,
    sink: GatedSink,
    kind: ResourceKind,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let open = tokio::select! {
            _ = cancel.cancelled() => break,
            open = poll_once(&*backend, &sink, kind) => open,
        };
        if !open {
            break;
        }
    }
    debug!(%kind, "poll task stopped");
}

/// Fetch one collection and merge it. Returns `false` once the gate is closed.
pub(crate) async fn poll_once<B: Backend>(backend: &B, sink: &GatedSink, kind: ResourceKind) -> bool {
    let body = match backend.fetch(kind).await {
        Ok(body) => body,
        Err(err) => {
            warn!(%kind, error = %err, "poll failed");
            return true;
        }
    };
    match ResourceUpdate::from_body(kind, &body) {
        Ok(update) => sink.ingest(update),
        Err(err) => {
            warn!(%kind, error = %err, "dropping polled update");
            true
        }
    }
}
