//! toolsync-runtime: the client-facing sync layer.
//!
//! [`SyncClient`] owns one transport channel and exposes snapshot reads,
//! subscriptions, and the mutation coordinator. The `toolsync` binary in
//! this crate is a thin CLI over it.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod credentials;

pub use client::{Subscription, SyncClient};
pub use config::{ClientConfig, ConfigError};
pub use coordinator::{Confirmation, MutationCoordinator};
pub use credentials::{
    CredentialError, CredentialStore, FileCredentialStore, Identity, MemoryCredentialStore,
};
