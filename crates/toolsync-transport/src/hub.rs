//! Snapshot hub: serialized merges plus subscriber fan-out.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use toolsync_core::{CacheSnapshot, MergeOutcome, ResourceCache, ResourceUpdate};
use tracing::debug;

/// Snapshot callback. Invoked on the merging task, in merge order.
///
/// Listeners may call [`SnapshotHub::snapshot`], `subscribe` and
/// `unsubscribe`, but must not merge or tear down the channel from inside
/// the callback.
pub type Listener = Arc<dyn Fn(&Arc<CacheSnapshot>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: BTreeMap<u64, Listener>,
}

/// Owner of the resource cache.
///
/// Merges are serialized by the cache mutex, which stays held while
/// listeners run so notifications are delivered in merge order. The
/// current snapshot is published separately so reads never wait on a merge.
pub struct SnapshotHub {
    cache: Mutex<ResourceCache>,
    current: RwLock<Arc<CacheSnapshot>>,
    listeners: Mutex<Listeners>,
}

impl Default for SnapshotHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotHub {
    pub fn new() -> Self {
        let cache = ResourceCache::new();
        let current = RwLock::new(cache.snapshot());
        Self {
            cache: Mutex::new(cache),
            current,
            listeners: Mutex::new(Listeners::default()),
        }
    }

    /// Current snapshot. Never blocks on network activity.
    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Arc<CacheSnapshot>) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let mut listeners = lock(&self.listeners);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.insert(id, listener);
        SubscriptionId(id)
    }

    /// Idempotent; unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        lock(&self.listeners).entries.remove(&id.0);
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.listeners).entries.len()
    }

    /// Apply `update` and notify every subscriber if the snapshot changed.
    pub fn merge(&self, update: ResourceUpdate) -> MergeOutcome {
        let kind = update.kind();
        let mut cache = lock(&self.cache);
        let outcome = cache.apply(update);

        let Some(snapshot) = outcome.changed().cloned() else {
            debug!(%kind, "merge unchanged");
            return outcome;
        };

        {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            *current = Arc::clone(&snapshot);
        }

        let targets: Vec<Listener> = lock(&self.listeners).entries.values().cloned().collect();
        debug!(
            %kind,
            version = snapshot.version,
            listeners = targets.len(),
            "merged"
        );
        for listener in targets {
            listener(&snapshot);
        }
        drop(cache);
        outcome
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Tests ────────────────────────────────────────────────────────
