//! toolsync-core: data model, wire decoding, and the pure state machines
//! behind the sync layer (resource cache reducer, mutation guards,
//! reconnect policy). No IO, no async, no clock access.

pub mod cache;
pub mod error;
pub mod history;
pub mod mutation;
pub mod reconnect;
pub mod types;
pub mod update;

pub use cache::{CacheSnapshot, MergeOutcome, ResourceCache};
pub use error::{ErrorKind, SettingError, SyncError};
pub use mutation::{Intent, MutationLedger, MutationPhase, MutationRequest, MutationTarget};
pub use reconnect::{ReconnectPolicy, ReconnectTracker};
pub use types::{EntityRef, HistoryRecord, Job, RobotStatus, Station, Tool, ToolStatus};
pub use update::{ResourceKind, ResourceUpdate};
