//! reqwest-based [`Backend`] and SSE [`PushSource`].

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest_eventsource::{Event, EventSource, retry};
use toolsync_core::{MutationRequest, ResourceKind};
use tracing::debug;

use crate::backend::{Backend, PushEvent, PushSource, PushStream};
use crate::error::TransportError;

/// HTTP access to the tool service.
///
/// Holds two clients: one with a whole-request timeout for REST calls, and
/// one with only a connect timeout for the long-lived event stream.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    stream_path: String,
    client: reqwest::Client,
    stream_client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(
        api_url: &str,
        stream_path: &str,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        let stream_client = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .build()?;
        Ok(Self {
            base_url: api_url.trim_end_matches('/').to_owned(),
            stream_path: stream_path.to_owned(),
            client,
            stream_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Backend for HttpBackend {
    async fn fetch(&self, kind: ResourceKind) -> Result<String, TransportError> {
        let path = kind.path();
        let resp = self.client.get(self.url(path)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                method: "GET",
                path: path.to_owned(),
                status: status.as_u16(),
            });
        }
        Ok(resp.text().await?)
    }

    async fn submit(&self, request: &MutationRequest) -> Result<(), TransportError> {
        let path = request.path();
        debug!(path, "submitting mutation");
        let resp = self
            .client
            .post(self.url(path))
            .json(&request.body())
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                method: "POST",
                path: path.to_owned(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

impl PushSource for HttpBackend {
    fn open(&self) -> Result<PushStream, TransportError> {
        let url = self.url(&self.stream_path);
        debug!(%url, "opening event stream");
        let builder = self
            .stream_client
            .get(&url)
            .header(ACCEPT, "text/event-stream");
        let mut es =
            EventSource::new(builder).map_err(|e| TransportError::Stream(e.to_string()))?;
        es.set_retry_policy(Box::new(retry::Never));

        let stream = es.map(|item| match item {
            Ok(Event::Open) => Ok(PushEvent::Opened),
            Ok(Event::Message(msg)) => Ok(PushEvent::Message {
                event: msg.event,
                data: msg.data,
            }),
            Err(reqwest_eventsource::Error::StreamEnded) => Err(TransportError::StreamEnded),
            Err(e) => Err(TransportError::Stream(e.to_string())),
        });
        Ok(stream.boxed())
    }
}
