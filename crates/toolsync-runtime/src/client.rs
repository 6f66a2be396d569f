//! `SyncClient`: the surface UI code talks to.
//!
//! Bundles one transport channel, the snapshot hub it feeds, and the
//! mutation coordinator. Dropping the client tears the channel down.

use std::sync::{Arc, Weak};

use toolsync_core::{CacheSnapshot, Intent, MutationPhase, MutationTarget, SyncError};
use toolsync_transport::{
    Backend, ChannelOptions, ChannelState, HttpBackend, PushSource, SnapshotHub, SubscriptionId,
    TransportChannel, TransportError,
};

use crate::config::ClientConfig;
use crate::coordinator::{Confirmation, MutationCoordinator};
use crate::credentials::CredentialStore;

/// RAII subscription handle. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    hub: Weak<SnapshotHub>,
    id: SubscriptionId,
}

impl Subscription {
    /// Explicit unsubscribe. Safe after the client is gone.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

pub struct SyncClient<B: Backend + PushSource = HttpBackend> {
    channel: TransportChannel<B>,
    coordinator: MutationCoordinator<B>,
}

impl SyncClient<HttpBackend> {
    pub fn from_config(
        config: &ClientConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, TransportError> {
        let backend = HttpBackend::new(
            &config.api_url,
            &config.stream_path,
            config.request_timeout(),
        )?;
        Ok(Self::new(
            Arc::new(backend),
            config.channel_options(),
            credentials,
        ))
    }
}

impl<B: Backend + PushSource> SyncClient<B> {
    pub fn new(
        backend: Arc<B>,
        options: ChannelOptions,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let hub = Arc::new(SnapshotHub::new());
        let coordinator =
            MutationCoordinator::new(Arc::clone(&backend), Arc::clone(&hub), credentials);
        let channel = TransportChannel::new(backend, hub, options);
        Self {
            channel,
            coordinator,
        }
    }

    // ─── Channel ──────────────────────────────────────────────────

    /// Start push + poll, replacing any live connection. Requires a tokio
    /// runtime.
    pub fn connect(&self) {
        self.channel.connect();
    }

    pub fn disconnect(&self) {
        self.channel.disconnect();
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    pub fn watch_channel_state(&self) -> tokio::sync::watch::Receiver<ChannelState> {
        self.channel.watch_state()
    }

    // ─── Snapshots ────────────────────────────────────────────────

    pub fn get_snapshot(&self) -> Arc<CacheSnapshot> {
        self.channel.hub().snapshot()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<CacheSnapshot>) + Send + Sync + 'static,
    {
        let hub = self.channel.hub();
        Subscription {
            hub: Arc::downgrade(hub),
            id: hub.subscribe(listener),
        }
    }

    /// Fetch every collection once and merge what arrives. Collections that
    /// fail are skipped; the first error is returned after all were tried.
    /// Results landing after `disconnect` are discarded.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        self.channel.refresh().await
    }

    // ─── Mutations ────────────────────────────────────────────────

    pub fn coordinator(&self) -> &MutationCoordinator<B> {
        &self.coordinator
    }

    pub fn request(&self, intent: Intent) -> Result<Confirmation, SyncError> {
        self.coordinator.request(intent)
    }

    pub fn request_tool_checkout(&self, tool_id: &str) -> Result<Confirmation, SyncError> {
        self.coordinator.request_tool_checkout(tool_id)
    }

    pub fn request_tool_checkin(&self, tool_id: &str) -> Result<Confirmation, SyncError> {
        self.coordinator.request_tool_checkin(tool_id)
    }

    pub fn request_job_checkout(&self, job_id: &str) -> Result<Confirmation, SyncError> {
        self.coordinator.request_job_checkout(job_id)
    }

    pub fn request_travel(&self, destination: &str) -> Result<Confirmation, SyncError> {
        self.coordinator.request_travel(destination)
    }

    pub async fn confirm(&self, confirmation: Confirmation) -> Result<(), SyncError> {
        self.coordinator.confirm(confirmation).await
    }

    pub fn cancel(&self, confirmation: Confirmation) {
        self.coordinator.cancel(confirmation);
    }

    pub async fn emergency_stop(&self) -> Result<(), SyncError> {
        self.coordinator.emergency_stop().await
    }

    pub fn phase(&self, target: &MutationTarget) -> MutationPhase {
        self.coordinator.phase(target)
    }
}

// ─── Tests ────────────────────────────────────────────────────────
