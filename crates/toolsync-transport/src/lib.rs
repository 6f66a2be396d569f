//! toolsync-transport: IO boundary of the sync layer.
//!
//! Owns the push stream (SSE with reconnect), the fixed-interval poll
//! fallback, and the [`SnapshotHub`] that serializes merges into the
//! resource cache and fans snapshots out to subscribers.

pub mod backend;
pub mod channel;
pub mod error;
pub mod http;
pub mod hub;
mod poll;
mod push;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{Backend, PushEvent, PushSource, PushStream};
pub use channel::{ChannelOptions, ChannelState, TransportChannel};
pub use error::TransportError;
pub use http::HttpBackend;
pub use hub::{Listener, SnapshotHub, SubscriptionId};
pub use poll::PollConfig;
