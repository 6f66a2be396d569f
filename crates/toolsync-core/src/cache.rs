//! Resource cache: the canonical snapshot of remote state.
//!
//! A pure reducer. Holds no timers and performs no IO; every merge is a
//! full replace of one collection and yields a fresh immutable
//! [`CacheSnapshot`]. Notification fan-out is the caller's job.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;

use crate::history;
use crate::types::{HistoryRecord, Job, JobId, RobotStatus, Tool, ToolId};
use crate::update::{ResourceKind, ResourceUpdate};

/// Monotonic snapshot version. Bumped only when content changes.
pub type SnapshotVersion = u64;

// ─── Snapshot ─────────────────────────────────────────────────────

/// Immutable aggregate of all cached resource state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheSnapshot {
    pub version: SnapshotVersion,
    /// Kind whose merge produced this snapshot (`None` for the empty initial one).
    pub last_merged: Option<ResourceKind>,
    /// `None` until the first status arrives; treated as disconnected.
    pub status: Option<RobotStatus>,
    pub tools: BTreeMap<ToolId, Tool>,
    pub jobs: BTreeMap<JobId, Job>,
    /// Sorted for display, most recent activity first.
    pub history: Vec<HistoryRecord>,
    /// Collections merged at least once, including empty payloads.
    pub received: BTreeSet<ResourceKind>,
}

impl CacheSnapshot {
    /// Whether `kind` has been merged at least once. Tells a collection the
    /// backend sent empty apart from one that never arrived.
    pub fn has_received(&self, kind: ResourceKind) -> bool {
        self.received.contains(&kind)
    }

    pub fn is_connected(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.is_connected)
    }

    pub fn tool(&self, id: &str) -> Option<&Tool> {
        self.tools.get(id)
    }

    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }

    /// Referenced tools of `job` that are not `Available` in this snapshot.
    /// Tools missing from the snapshot count as unavailable.
    pub fn unavailable_tools(&self, job: &Job) -> Vec<ToolId> {
        job.tools
            .iter()
            .filter_map(|r| {
                let Some(id) = r.id() else {
                    return Some(r.name().unwrap_or("<unnamed>").to_owned());
                };
                match self.tools.get(id) {
                    Some(tool) if tool.is_available() => None,
                    _ => Some(id.to_owned()),
                }
            })
            .collect()
    }
}

// ─── Merge ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Content changed; this is the new current snapshot.
    Changed(Arc<CacheSnapshot>),
    /// Payload equal to what is already cached. Nothing to notify.
    Unchanged,
}

impl MergeOutcome {
    pub fn changed(&self) -> Option<&Arc<CacheSnapshot>> {
        match self {
            Self::Changed(snapshot) => Some(snapshot),
            Self::Unchanged => None,
        }
    }
}

/// Owner of the canonical snapshot.
#[derive(Debug, Default)]
pub struct ResourceCache {
    current: Arc<CacheSnapshot>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        Arc::clone(&self.current)
    }

    pub fn version(&self) -> SnapshotVersion {
        self.current.version
    }

    /// Single entry point used by both the push and the poll path.
    pub fn apply(&mut self, update: ResourceUpdate) -> MergeOutcome {
        match update {
            ResourceUpdate::Status(status) => self.merge_status(status),
            ResourceUpdate::Tools(tools) => self.merge_tools(tools),
            ResourceUpdate::Jobs(jobs) => self.merge_jobs(jobs),
            ResourceUpdate::History(records) => self.merge_history(records),
        }
    }

    /// Status is always sent whole by the backend; replace it wholesale.
    pub fn merge_status(&mut self, status: RobotStatus) -> MergeOutcome {
        if self.current.status.as_ref() == Some(&status) {
            return MergeOutcome::Unchanged;
        }
        self.commit(ResourceKind::Status, |next| next.status = Some(status))
    }

    pub fn merge_tools(&mut self, tools: Vec<Tool>) -> MergeOutcome {
        let tools: BTreeMap<ToolId, Tool> = tools.into_iter().map(|t| (t.id.clone(), t)).collect();
        if self.current.has_received(ResourceKind::Tools) && self.current.tools == tools {
            return MergeOutcome::Unchanged;
        }
        self.commit(ResourceKind::Tools, |next| next.tools = tools)
    }

    pub fn merge_jobs(&mut self, jobs: Vec<Job>) -> MergeOutcome {
        let jobs: BTreeMap<JobId, Job> = jobs.into_iter().map(|j| (j.id.clone(), j)).collect();
        if self.current.has_received(ResourceKind::Jobs) && self.current.jobs == jobs {
            return MergeOutcome::Unchanged;
        }
        self.commit(ResourceKind::Jobs, |next| next.jobs = jobs)
    }

    pub fn merge_history(&mut self, mut records: Vec<HistoryRecord>) -> MergeOutcome {
        history::sort_for_display(&mut records);
        if self.current.has_received(ResourceKind::History) && self.current.history == records
        {
            return MergeOutcome::Unchanged;
        }
        self.commit(ResourceKind::History, |next| next.history = records)
    }

    fn commit(
        &mut self,
        kind: ResourceKind,
        replace: impl FnOnce(&mut CacheSnapshot),
    ) -> MergeOutcome {
        let mut next = CacheSnapshot::clone(&self.current);
        replace(&mut next);
        next.version = self.current.version + 1;
        next.last_merged = Some(kind);
        next.received.insert(kind);
        self.current = Arc::new(next);
        MergeOutcome::Changed(Arc::clone(&self.current))
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityRef, Station, ToolStatus};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn tool(id: &str, status: ToolStatus) -> Tool {
        Tool {
            id: id.to_owned(),
            name: format!("tool {id}"),
            status,
            checked_out_by: match status {
                ToolStatus::Available => None,
                ToolStatus::CheckedOut => Some(EntityRef::Id("u-1".into())),
            },
        }
    }

    fn status(connected: bool, station: &str) -> RobotStatus {
        RobotStatus {
            is_connected: connected,
            current_station: Station::new(station),
            is_traveling: false,
            destination_station: None,
            last_checked: Utc.timestamp_opt(1_700_000_000, 0).single().expect("ts"),
        }
    }

    #[test]
    fn empty_cache_is_disconnected() {
        let cache = ResourceCache::new();
        let snap = cache.snapshot();
        assert_eq!(snap.version, 0);
        assert!(!snap.is_connected());
        assert!(snap.last_merged.is_none());
    }

    #[test]
    fn status_merge_replaces_wholesale() {
        let mut cache = ResourceCache::new();
        cache.merge_status(status(true, "Station A"));
        cache.merge_status(status(false, "Station B"));
        let snap = cache.snapshot();
        let s = snap.status.as_ref().expect("status");
        assert!(!s.is_connected);
        assert_eq!(s.current_station.as_str(), "Station B");
        assert_eq!(snap.version, 2);
        assert_eq!(snap.last_merged, Some(ResourceKind::Status));
    }

    #[test]
    fn tools_merge_is_full_replace() {
        let mut cache = ResourceCache::new();
        cache.merge_tools(vec![
            tool("t-1", ToolStatus::Available),
            tool("t-2", ToolStatus::Available),
        ]);
        cache.merge_tools(vec![tool("t-3", ToolStatus::CheckedOut)]);
        let snap = cache.snapshot();
        let ids: Vec<_> = snap.tools.keys().cloned().collect();
        assert_eq!(ids, vec!["t-3".to_string()]);
    }

    #[test]
    fn jobs_merge_is_full_replace() {
        let mut cache = ResourceCache::new();
        let job = |id: &str| Job {
            id: id.to_owned(),
            name: id.to_owned(),
            tools: Vec::new(),
        };
        cache.merge_jobs(vec![job("j-1"), job("j-2")]);
        cache.merge_jobs(vec![job("j-2")]);
        assert_eq!(cache.snapshot().jobs.len(), 1);
        assert!(cache.snapshot().job("j-2").is_some());
    }

    #[test]
    fn duplicate_merge_does_not_bump_version() {
        let mut cache = ResourceCache::new();
        let first = cache.merge_tools(vec![tool("t-1", ToolStatus::Available)]);
        assert!(first.changed().is_some());
        let second = cache.merge_tools(vec![tool("t-1", ToolStatus::Available)]);
        assert_eq!(second, MergeOutcome::Unchanged);
        assert_eq!(cache.version(), 1);
    }

    #[test]
    fn first_empty_collection_counts_as_received() {
        let mut cache = ResourceCache::new();
        assert!(!cache.snapshot().has_received(ResourceKind::Tools));

        let first = cache.merge_tools(Vec::new());
        assert!(first.changed().is_some());
        let snap = cache.snapshot();
        assert!(snap.has_received(ResourceKind::Tools));
        assert!(!snap.has_received(ResourceKind::Jobs));
        assert!(snap.tools.is_empty());

        assert_eq!(cache.merge_tools(Vec::new()), MergeOutcome::Unchanged);
        assert_eq!(cache.version(), 1);
    }

    #[test]
    fn history_merge_derives_display_order() {
        let t = |s: i64| Utc.timestamp_opt(1_700_000_000 + s, 0).single().expect("ts");
        let r1 = HistoryRecord {
            tool: None,
            user: None,
            check_out: Some(t(1)),
            check_in: None,
        };
        let r2 = HistoryRecord {
            tool: None,
            user: None,
            check_out: Some(t(2)),
            check_in: Some(t(3)),
        };
        let mut cache = ResourceCache::new();
        cache.merge_history(vec![r1.clone(), r2.clone()]);
        assert_eq!(cache.snapshot().history, vec![r2, r1]);
    }

    #[test]
    fn old_snapshots_are_not_mutated() {
        let mut cache = ResourceCache::new();
        cache.merge_tools(vec![tool("t-1", ToolStatus::Available)]);
        let before = cache.snapshot();
        cache.merge_tools(vec![tool("t-1", ToolStatus::CheckedOut)]);
        assert!(before.tool("t-1").expect("tool").is_available());
        assert!(!cache.snapshot().tool("t-1").expect("tool").is_available());
    }

    #[test]
    fn unavailable_tools_lists_checked_out_and_missing() {
        let mut cache = ResourceCache::new();
        cache.merge_tools(vec![
            tool("t-1", ToolStatus::Available),
            tool("t-2", ToolStatus::CheckedOut),
        ]);
        let job = Job {
            id: "j-1".into(),
            name: "Service".into(),
            tools: vec![
                EntityRef::Id("t-1".into()),
                EntityRef::Id("t-2".into()),
                EntityRef::Id("t-404".into()),
            ],
        };
        assert_eq!(
            cache.snapshot().unavailable_tools(&job),
            vec!["t-2".to_string(), "t-404".to_string()]
        );
    }

    fn arb_tools() -> impl Strategy<Value = Vec<Tool>> {
        proptest::collection::vec(("[a-e]", any::<bool>()), 0..8).prop_map(|specs| {
            specs
                .into_iter()
                .map(|(id, available)| {
                    let status = if available {
                        ToolStatus::Available
                    } else {
                        ToolStatus::CheckedOut
                    };
                    tool(&id, status)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn merging_twice_equals_merging_once(seed in arb_tools(), payload in arb_tools()) {
            let mut once = ResourceCache::new();
            once.merge_tools(seed.clone());
            once.merge_tools(payload.clone());

            let mut twice = ResourceCache::new();
            twice.merge_tools(seed);
            twice.merge_tools(payload.clone());
            twice.merge_tools(payload);

            prop_assert_eq!(once.snapshot(), twice.snapshot());
        }

        #[test]
        fn tools_after_merge_equal_payload(first in arb_tools(), second in arb_tools()) {
            let mut cache = ResourceCache::new();
            cache.merge_tools(first);
            cache.merge_tools(second.clone());
            let expected: BTreeMap<ToolId, Tool> =
                second.into_iter().map(|t| (t.id.clone(), t)).collect();
            prop_assert_eq!(&cache.snapshot().tools, &expected);
        }
    }
}
