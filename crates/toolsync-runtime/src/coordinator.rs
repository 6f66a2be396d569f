//! Mutation coordinator: confirm-then-submit flow over the pure guards in
//! `toolsync_core::mutation`.
//!
//! Every rejection that can be decided from the current snapshot is decided
//! here without a network call. Accepted mutations are never applied to the
//! cache locally; the next push or poll merge carries the new state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use toolsync_core::{
    Intent, MutationLedger, MutationPhase, MutationRequest, MutationTarget, SyncError,
};
use toolsync_transport::{Backend, SnapshotHub};
use tracing::{info, warn};

use crate::credentials::{CredentialStore, Identity};

/// Proof that guards passed and the user is being asked to confirm.
///
/// Consumed by [`MutationCoordinator::confirm`] or
/// [`MutationCoordinator::cancel`], so one confirmation yields at most one
/// backend call.
#[derive(Debug)]
#[must_use = "a confirmation must be confirmed or cancelled"]
pub struct Confirmation {
    intent: Intent,
}

impl Confirmation {
    pub fn intent(&self) -> &Intent {
        &self.intent
    }

    pub fn target(&self) -> MutationTarget {
        self.intent.target()
    }
}

pub struct MutationCoordinator<B: Backend> {
    backend: Arc<B>,
    hub: Arc<SnapshotHub>,
    credentials: Arc<dyn CredentialStore>,
    ledger: Mutex<MutationLedger>,
}

impl<B: Backend> MutationCoordinator<B> {
    pub fn new(
        backend: Arc<B>,
        hub: Arc<SnapshotHub>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            backend,
            hub,
            credentials,
            ledger: Mutex::new(MutationLedger::new()),
        }
    }

    pub fn phase(&self, target: &MutationTarget) -> MutationPhase {
        self.ledger().phase(target)
    }

    /// Check guards for `intent` and enter `Confirming`.
    pub fn request(&self, intent: Intent) -> Result<Confirmation, SyncError> {
        let snapshot = self.hub.snapshot();
        intent.check(&snapshot)?;
        if intent.acts_for_user() {
            self.user_id()?;
        }
        self.ledger().begin_confirm(&intent.target())?;
        Ok(Confirmation { intent })
    }

    pub fn request_tool_checkout(&self, tool_id: &str) -> Result<Confirmation, SyncError> {
        self.request(Intent::CheckoutTool {
            tool_id: tool_id.to_owned(),
        })
    }

    pub fn request_tool_checkin(&self, tool_id: &str) -> Result<Confirmation, SyncError> {
        self.request(Intent::CheckinTool {
            tool_id: tool_id.to_owned(),
        })
    }

    pub fn request_job_checkout(&self, job_id: &str) -> Result<Confirmation, SyncError> {
        self.request(Intent::CheckoutJob {
            job_id: job_id.to_owned(),
        })
    }

    pub fn request_travel(&self, destination: &str) -> Result<Confirmation, SyncError> {
        self.request(Intent::Travel {
            destination: toolsync_core::Station::new(destination),
        })
    }

    /// Re-check guards against the latest snapshot, then submit once.
    pub async fn confirm(&self, confirmation: Confirmation) -> Result<(), SyncError> {
        let Confirmation { intent } = confirmation;
        let target = intent.target();

        let request = match self.prepare(&intent) {
            Ok(request) => request,
            Err(err) => {
                self.ledger().cancel(&target);
                return Err(err);
            }
        };
        self.ledger().begin_submit(&target)?;
        self.submit(&target, &request).await
    }

    pub fn cancel(&self, confirmation: Confirmation) {
        self.ledger().cancel(&confirmation.target());
    }

    /// Reset travel state. Not gated on connectivity, confirmation, or a
    /// travel request already in flight; repeated stops are harmless.
    pub async fn emergency_stop(&self) -> Result<(), SyncError> {
        let request = MutationRequest::ResetTravel;
        warn!("emergency stop requested");
        self.backend.submit(&request).await.map_err(|err| {
            warn!(error = %err, "emergency stop failed");
            SyncError::from(err)
        })
    }

    fn prepare(&self, intent: &Intent) -> Result<MutationRequest, SyncError> {
        let snapshot = self.hub.snapshot();
        intent.check(&snapshot)?;
        let user_id = if intent.acts_for_user() {
            self.user_id()?
        } else {
            String::new()
        };
        intent.to_request(&snapshot, &user_id, Utc::now())
    }

    async fn submit(
        &self,
        target: &MutationTarget,
        request: &MutationRequest,
    ) -> Result<(), SyncError> {
        let result = self.backend.submit(request).await;
        self.ledger().finish(target, result.is_ok());
        match result {
            Ok(()) => {
                info!(path = request.path(), ?target, "mutation accepted");
                Ok(())
            }
            Err(err) => {
                warn!(path = request.path(), ?target, error = %err, "mutation failed");
                Err(err.into())
            }
        }
    }

    fn user_id(&self) -> Result<String, SyncError> {
        let identity = Identity::load(self.credentials.as_ref()).map_err(|e| {
            SyncError::PreconditionFailed {
                reason: format!("cannot read credentials: {e}"),
                unavailable: Vec::new(),
            }
        })?;
        identity
            .map(|i| i.user_id)
            .ok_or_else(|| SyncError::PreconditionFailed {
                reason: "no signed-in user".into(),
                unavailable: Vec::new(),
            })
    }

    fn ledger(&self) -> MutexGuard<'_, MutationLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use toolsync_core::{ErrorKind, ResourceKind, ResourceUpdate, ToolStatus};
    use toolsync_transport::testing::FakeBackend;

    fn status(connected: bool, station: &str) -> ResourceUpdate {
        let body = format!(
            r#"{{"isConnected":{connected},"currentStation":"{station}","isTraveling":false,
                "destinationStation":null,"lastChecked":"2024-05-01T12:00:00Z"}}"#
        );
        ResourceUpdate::from_body(ResourceKind::Status, &body).expect("status")
    }

    fn tools() -> ResourceUpdate {
        ResourceUpdate::from_body(
            ResourceKind::Tools,
            r#"[
                {"_id":"t-1","name":"Drill","status":"Available"},
                {"_id":"t-2","name":"Saw","status":"Checked Out","checkedOutBy":"u-2"}
            ]"#,
        )
        .expect("tools")
    }

    fn jobs() -> ResourceUpdate {
        ResourceUpdate::from_body(
            ResourceKind::Jobs,
            r#"[{"_id":"j-1","name":"Cabinet","tools":["t-2","t-1"]},
                {"_id":"j-2","name":"Shelf","tools":[{"_id":"t-1","name":"Drill"}]}]"#,
        )
        .expect("jobs")
    }

    struct Fixture {
        backend: Arc<FakeBackend>,
        hub: Arc<SnapshotHub>,
        coordinator: Arc<MutationCoordinator<FakeBackend>>,
    }

    fn fixture(connected: bool) -> Fixture {
        let backend = Arc::new(FakeBackend::new());
        let hub = Arc::new(SnapshotHub::new());
        hub.merge(status(connected, "Station A"));
        hub.merge(tools());
        hub.merge(jobs());
        let coordinator = Arc::new(MutationCoordinator::new(
            Arc::clone(&backend),
            Arc::clone(&hub),
            Arc::new(MemoryCredentialStore::with_user("u-1")),
        ));
        Fixture {
            backend,
            hub,
            coordinator,
        }
    }

    #[tokio::test]
    async fn checkout_submits_once_and_leaves_cache_alone() {
        let fx = fixture(true);
        let target = MutationTarget::Tool("t-1".into());
        let confirmation = fx.coordinator.request_tool_checkout("t-1").expect("request");
        assert_eq!(fx.coordinator.phase(&target), MutationPhase::Confirming);
        assert_eq!(fx.backend.network_calls(), 0);

        fx.coordinator.confirm(confirmation).await.expect("confirm");
        assert_eq!(fx.coordinator.phase(&target), MutationPhase::Succeeded);

        let submitted = fx.backend.submitted();
        assert_eq!(submitted.len(), 1);
        match &submitted[0] {
            MutationRequest::ToolCheckout { tool_id, user_id, .. } => {
                assert_eq!(tool_id, "t-1");
                assert_eq!(user_id, "u-1");
            }
            other => panic!("unexpected request {other:?}"),
        }
        // No optimistic flip.
        let snap = fx.hub.snapshot();
        assert_eq!(snap.tool("t-1").expect("tool").status, ToolStatus::Available);
    }

    #[tokio::test]
    async fn disconnected_checkout_fails_without_network() {
        let fx = fixture(false);
        let err = fx.coordinator.request_tool_checkout("t-1").expect_err("reject");
        assert_eq!(err, SyncError::NotConnected);
        assert_eq!(fx.backend.network_calls(), 0);
        assert_eq!(
            fx.coordinator.phase(&MutationTarget::Tool("t-1".into())),
            MutationPhase::Idle
        );
    }

    #[tokio::test]
    async fn travel_to_current_station_is_noop_without_network() {
        let fx = fixture(true);
        let err = fx.coordinator.request_travel("Station A").expect_err("reject");
        assert_eq!(err.kind(), ErrorKind::NoOp);
        assert_eq!(fx.backend.network_calls(), 0);
    }

    #[tokio::test]
    async fn job_with_checked_out_tool_is_rejected_without_network() {
        let fx = fixture(true);
        let err = fx.coordinator.request_job_checkout("j-1").expect_err("reject");
        assert_eq!(
            err,
            SyncError::PreconditionFailed {
                reason: "job j-1 has unavailable tools".into(),
                unavailable: vec!["t-2".into()],
            }
        );
        assert_eq!(fx.backend.network_calls(), 0);

        let ok = fx.coordinator.request_job_checkout("j-2").expect("request");
        fx.coordinator.confirm(ok).await.expect("confirm");
        assert_eq!(fx.backend.submitted().len(), 1);
    }

    #[tokio::test]
    async fn cancel_returns_to_idle_without_network() {
        let fx = fixture(true);
        let confirmation = fx.coordinator.request_travel("Station B").expect("request");
        assert_eq!(fx.coordinator.phase(&MutationTarget::Robot), MutationPhase::Confirming);
        fx.coordinator.cancel(confirmation);
        assert_eq!(fx.coordinator.phase(&MutationTarget::Robot), MutationPhase::Idle);
        assert_eq!(fx.backend.network_calls(), 0);
    }

    #[tokio::test]
    async fn guards_are_rechecked_at_confirm() {
        let fx = fixture(true);
        let confirmation = fx.coordinator.request_travel("Station B").expect("request");
        // Robot arrives at B (or the link drops) while the user is deciding.
        fx.hub.merge(status(true, "Station B"));
        let err = fx.coordinator.confirm(confirmation).await.expect_err("reject");
        assert_eq!(err.kind(), ErrorKind::NoOp);
        assert_eq!(fx.backend.network_calls(), 0);
        assert_eq!(fx.coordinator.phase(&MutationTarget::Robot), MutationPhase::Idle);
    }

    #[tokio::test]
    async fn backend_failure_surfaces_and_returns_to_idle() {
        let fx = fixture(true);
        fx.backend.fail_submits_with(500);
        let confirmation = fx.coordinator.request_tool_checkin("t-2").expect("request");
        let err = fx.coordinator.confirm(confirmation).await.expect_err("fail");
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert_eq!(
            fx.coordinator.phase(&MutationTarget::Tool("t-2".into())),
            MutationPhase::Idle
        );
        // Single attempt, no retry.
        assert_eq!(fx.backend.submitted().len(), 1);
    }

    #[tokio::test]
    async fn second_confirm_while_submitting_is_noop() {
        let fx = fixture(true);
        fx.backend.hold_submits();
        let first = fx.coordinator.request_tool_checkout("t-1").expect("first");
        let second = fx.coordinator.request_tool_checkout("t-1").expect("second");

        let coordinator = Arc::clone(&fx.coordinator);
        let in_flight = tokio::spawn(async move { coordinator.confirm(first).await });
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            fx.coordinator.phase(&MutationTarget::Tool("t-1".into())),
            MutationPhase::Submitting
        );

        let err = fx.coordinator.confirm(second).await.expect_err("duplicate");
        assert_eq!(err.kind(), ErrorKind::NoOp);

        fx.backend.release_submit();
        in_flight.await.expect("join").expect("confirm");
        assert_eq!(fx.backend.submitted().len(), 1);
    }

    #[tokio::test]
    async fn emergency_stop_ignores_connectivity_and_travel_in_flight() {
        let fx = fixture(false);
        fx.coordinator.emergency_stop().await.expect("estop");
        fx.coordinator.emergency_stop().await.expect("estop again");
        assert_eq!(
            fx.backend.submitted(),
            vec![MutationRequest::ResetTravel, MutationRequest::ResetTravel]
        );
    }

    #[tokio::test]
    async fn checkout_without_user_is_rejected() {
        let backend = Arc::new(FakeBackend::new());
        let hub = Arc::new(SnapshotHub::new());
        hub.merge(status(true, "Station A"));
        hub.merge(tools());
        let coordinator =
            MutationCoordinator::new(backend, hub, Arc::new(MemoryCredentialStore::new()));
        let err = coordinator.request_tool_checkout("t-1").expect_err("reject");
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        assert!(err.to_string().contains("no signed-in user"));
    }
}
