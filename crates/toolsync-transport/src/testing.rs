//! Scripted in-memory backend with call counters.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{StreamExt, stream};
use tokio::sync::Notify;
use tokio::time::Instant;
use toolsync_core::{MutationRequest, ResourceKind};

use crate::backend::{Backend, PushEvent, PushSource, PushStream};
use crate::error::TransportError;
use crate::hub::lock;

/// What one call to [`PushSource::open`] produces.
#[derive(Debug, Clone)]
pub enum PushSession {
    /// `open` itself fails.
    Refused,
    /// Yields `events`, then either ends or stays open forever.
    Events { events: Vec<PushEvent>, hang: bool },
}

impl PushSession {
    pub fn ending(events: Vec<PushEvent>) -> Self {
        Self::Events {
            events,
            hang: false,
        }
    }

    pub fn hanging(events: Vec<PushEvent>) -> Self {
        Self::Events { events, hang: true }
    }
}

pub fn message(event: &str, data: &str) -> PushEvent {
    PushEvent::Message {
        event: event.to_owned(),
        data: data.to_owned(),
    }
}

/// Fake [`Backend`] + [`PushSource`].
///
/// Fetches return the configured body per collection (HTTP 404 if unset).
/// Push sessions are consumed in order; once the script runs out every
/// open yields an immediately-ending stream.
#[derive(Default)]
pub struct FakeBackend {
    bodies: Mutex<HashMap<ResourceKind, String>>,
    fetches: Mutex<HashMap<ResourceKind, usize>>,
    fetch_delays: Mutex<HashMap<ResourceKind, Duration>>,
    held_fetches: Mutex<HashSet<ResourceKind>>,
    fetch_release: Notify,
    submitted: Mutex<Vec<MutationRequest>>,
    submit_status: Mutex<Option<u16>>,
    hold_submits: AtomicBool,
    release: Notify,
    sessions: Mutex<VecDeque<PushSession>>,
    opens: Mutex<Vec<Instant>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_body(&self, kind: ResourceKind, body: impl Into<String>) {
        lock(&self.bodies).insert(kind, body.into());
    }

    /// Every fetch of `kind` takes `delay` before answering.
    pub fn delay_fetches(&self, kind: ResourceKind, delay: Duration) {
        lock(&self.fetch_delays).insert(kind, delay);
    }

    /// Park fetches of `kind` until [`Self::release_fetches`] is called.
    pub fn hold_fetches(&self, kind: ResourceKind) {
        lock(&self.held_fetches).insert(kind);
    }

    /// Let every parked fetch answer and stop holding new ones.
    pub fn release_fetches(&self) {
        lock(&self.held_fetches).clear();
        self.fetch_release.notify_waiters();
    }

    pub fn push_session(&self, session: PushSession) {
        lock(&self.sessions).push_back(session);
    }

    /// Make every following submit fail with `status`.
    pub fn fail_submits_with(&self, status: u16) {
        *lock(&self.submit_status) = Some(status);
    }

    /// Park submits until [`Self::release_submit`] is called.
    pub fn hold_submits(&self) {
        self.hold_submits.store(true, Ordering::SeqCst);
    }

    pub fn release_submit(&self) {
        self.release.notify_one();
    }

    pub fn fetch_count(&self, kind: ResourceKind) -> usize {
        lock(&self.fetches).get(&kind).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        lock(&self.fetches).values().sum()
    }

    pub fn submitted(&self) -> Vec<MutationRequest> {
        lock(&self.submitted).clone()
    }

    pub fn open_count(&self) -> usize {
        lock(&self.opens).len()
    }

    pub fn open_times(&self) -> Vec<Instant> {
        lock(&self.opens).clone()
    }

    /// Fetches plus submits. Push opens are not counted.
    pub fn network_calls(&self) -> usize {
        self.total_fetches() + lock(&self.submitted).len()
    }
}

impl Backend for FakeBackend {
    async fn fetch(&self, kind: ResourceKind) -> Result<String, TransportError> {
        *lock(&self.fetches).entry(kind).or_default() += 1;
        let delay = lock(&self.fetch_delays).get(&kind).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let released = self.fetch_release.notified();
        let held = lock(&self.held_fetches).contains(&kind);
        if held {
            released.await;
        }
        let body = lock(&self.bodies).get(&kind).cloned();
        body.ok_or_else(|| TransportError::Status {
            method: "GET",
            path: kind.path().to_owned(),
            status: 404,
        })
    }

    async fn submit(&self, request: &MutationRequest) -> Result<(), TransportError> {
        lock(&self.submitted).push(request.clone());
        if self.hold_submits.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        let status = *lock(&self.submit_status);
        match status {
            Some(status) => Err(TransportError::Status {
                method: "POST",
                path: request.path().to_owned(),
                status,
            }),
            None => Ok(()),
        }
    }
}

impl PushSource for FakeBackend {
    fn open(&self) -> Result<PushStream, TransportError> {
        lock(&self.opens).push(Instant::now());
        let session = lock(&self.sessions)
            .pop_front()
            .unwrap_or(PushSession::ending(Vec::new()));
        match session {
            PushSession::Refused => Err(TransportError::Stream("connection refused".into())),
            PushSession::Events { events, hang } => {
                let head = stream::iter(events.into_iter().map(Ok));
                if hang {
                    Ok(head.chain(stream::pending()).boxed())
                } else {
                    Ok(head.boxed())
                }
            }
        }
    }
}
