//! Transport channel: lifecycle of one push task plus one poll task.
//!
//! ```text
//! Idle ──connect──▶ Connecting ──open──▶ Connected
//!                       ▲                    │ error / end
//!                       │                    ▼
//!                       └──── delay ──── Reconnecting{attempt}
//!
//! any ──disconnect──▶ Closed ──connect──▶ Connecting
//! ```
//!
//! Every connection owns a gate. `disconnect` closes it under its lock, so
//! once `disconnect` returns no merge from that connection can land, whether
//! it came from push, poll, or a caller's `refresh`.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use futures_util::future::join_all;
use toolsync_core::{ReconnectPolicy, ResourceKind, ResourceUpdate, SyncError};
use tracing::{debug, info, warn};

use crate::backend::{Backend, PushSource};
use crate::hub::{SnapshotHub, lock};
use crate::poll::{self, PollConfig};
use crate::push;

// ─── State ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChannelState {
    Idle,
    Connecting,
    Connected,
    /// Waiting to reopen the push stream after `attempt` consecutive failures.
    Reconnecting { attempt: u32 },
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelOptions {
    pub reconnect: ReconnectPolicy,
    pub poll: PollConfig,
}

// ─── Gate ─────────────────────────────────────────────────────────

/// Merge entry point shared by the push and poll tasks of one connection.
#[derive(Clone)]
pub(crate) struct GatedSink {
    hub: Arc<SnapshotHub>,
    open: Arc<Mutex<bool>>,
}

impl GatedSink {
    pub(crate) fn new(hub: Arc<SnapshotHub>) -> Self {
        Self {
            hub,
            open: Arc::new(Mutex::new(true)),
        }
    }

    /// Merge `update` unless the gate is closed. Returns whether the gate
    /// was open.
    pub(crate) fn ingest(&self, update: ResourceUpdate) -> bool {
        let open = lock(&self.open);
        if !*open {
            return false;
        }
        self.hub.merge(update);
        true
    }

    /// Blocks until any in-progress merge through this gate has finished.
    pub(crate) fn close(&self) {
        *lock(&self.open) = false;
    }

    fn is_open(&self) -> bool {
        *lock(&self.open)
    }
}

struct Connection {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Connection {
    fn shutdown(self) {
        self.cancel.cancel();
        for task in &self.tasks {
            task.abort();
        }
    }
}

// ─── Channel ──────────────────────────────────────────────────────

/// One logical connection to the backend.
///
/// At most one push stream and one poll task per collection exist per
/// channel; a second `connect` replaces the live connection. Dropping the
/// channel disconnects it.
pub struct TransportChannel<B: Backend + PushSource> {
    backend: Arc<B>,
    hub: Arc<SnapshotHub>,
    options: ChannelOptions,
    state: watch::Sender<ChannelState>,
    /// Gate of the current lifecycle: open while idle or connected, closed
    /// from `disconnect` until the next `connect`.
    gate: Mutex<GatedSink>,
    connection: Mutex<Option<Connection>>,
}

impl<B: Backend + PushSource> TransportChannel<B> {
    pub fn new(backend: Arc<B>, hub: Arc<SnapshotHub>, options: ChannelOptions) -> Self {
        let (state, _) = watch::channel(ChannelState::Idle);
        let gate = Mutex::new(GatedSink::new(Arc::clone(&hub)));
        Self {
            backend,
            hub,
            options,
            state,
            gate,
            connection: Mutex::new(None),
        }
    }

    pub fn hub(&self) -> &Arc<SnapshotHub> {
        &self.hub
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    pub fn is_active(&self) -> bool {
        lock(&self.connection).is_some()
    }

    /// Start the push and poll tasks, tearing down any prior connection
    /// first. Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut slot = lock(&self.connection);
        if let Some(prior) = slot.take() {
            debug!("replacing active connection");
            self.current_gate().close();
            prior.shutdown();
        }
        let sink = {
            let mut gate = lock(&self.gate);
            if !gate.is_open() {
                *gate = GatedSink::new(Arc::clone(&self.hub));
            }
            gate.clone()
        };

        let cancel = CancellationToken::new();
        self.state.send_replace(ChannelState::Connecting);
        info!(
            status_ms = self.options.poll.status_ms,
            reconnect_ms = self.options.reconnect.initial_delay_ms,
            "transport channel connecting"
        );

        let mut tasks = vec![tokio::spawn(push::run_push(
            Arc::clone(&self.backend),
            sink.clone(),
            self.options.reconnect.clone(),
            self.state.clone(),
            cancel.clone(),
        ))];
        tasks.extend(poll::spawn_polls(
            &self.backend,
            &sink,
            &self.options.poll,
            &cancel,
        ));

        *slot = Some(Connection { cancel, tasks });
    }

    /// Stop every task. Idempotent. No merge from this connection is
    /// applied after this returns.
    pub fn disconnect(&self) {
        let mut slot = lock(&self.connection);
        let Some(conn) = slot.take() else {
            return;
        };
        self.current_gate().close();
        conn.shutdown();
        self.state.send_replace(ChannelState::Closed);
        info!("transport channel closed");
    }

    /// Fetch every collection once and merge what arrives through the
    /// current gate. Collections that fail are skipped; the first error is
    /// returned after all were tried. Once the channel is disconnected,
    /// fetched payloads are discarded until the next `connect`.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let sink = self.current_gate();
        let fetches = ResourceKind::ALL.map(|kind| async move {
            let result = match self.backend.fetch(kind).await {
                Ok(body) => ResourceUpdate::from_body(kind, &body),
                Err(err) => Err(SyncError::from(err)),
            };
            (kind, result)
        });

        let mut first_err = None;
        for (kind, result) in join_all(fetches).await {
            match result {
                Ok(update) => {
                    if !sink.ingest(update) {
                        debug!("channel closed during refresh, discarding results");
                        break;
                    }
                }
                Err(err) => {
                    warn!(%kind, error = %err, "refresh failed");
                    first_err.get_or_insert(err);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn current_gate(&self) -> GatedSink {
        lock(&self.gate).clone()
    }
}

impl<B: Backend + PushSource> Drop for TransportChannel<B> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ─── Tests ────────────────────────────────────────────────────────
