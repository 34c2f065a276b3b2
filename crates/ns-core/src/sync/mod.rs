use std::sync::{Arc, Weak};

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::state::ExplorerSnapshot;

/// Components that want every committed snapshot
pub trait SnapshotSubscriber: Send + Sync {
    fn on_snapshot(&self, snapshot: &Arc<ExplorerSnapshot>);
}

/// Fans committed snapshots out to views
pub struct SyncManager {
    /// Latest committed snapshot
    latest: Arc<RwLock<Option<Arc<ExplorerSnapshot>>>>,

    subscribers: Arc<RwLock<Vec<Weak<dyn SnapshotSubscriber>>>>,

    /// View-specific sync settings
    view_settings: Arc<RwLock<AHashMap<String, ViewSyncSettings>>>,
}

/// Synchronization settings for a specific view
#[derive(Debug, Clone, Default)]
pub struct ViewSyncSettings {
    /// A frozen view keeps showing the snapshot it last received
    pub frozen: bool,
}

impl SyncManager {
    /// Create a new synchronization manager
    pub fn new() -> Self {
        Self {
            latest: Arc::new(RwLock::new(None)),
            subscribers: Arc::new(RwLock::new(Vec::new())),
            view_settings: Arc::new(RwLock::new(AHashMap::new())),
        }
    }

    /// Latest committed snapshot
    pub fn latest(&self) -> Option<Arc<ExplorerSnapshot>> {
        self.latest.read().clone()
    }

    /// Subscribe to snapshots. The subscriber is held weakly.
    pub fn subscribe(&self, subscriber: Weak<dyn SnapshotSubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Store `snapshot` as the latest and hand it to every live subscriber
    pub fn publish(&self, snapshot: Arc<ExplorerSnapshot>) {
        *self.latest.write() = Some(snapshot.clone());

        let live: Vec<Arc<dyn SnapshotSubscriber>> = {
            let mut subscribers = self.subscribers.write();
            subscribers.retain(|weak| weak.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };

        for subscriber in live {
            subscriber.on_snapshot(&snapshot);
        }
    }

    /// Register a view with sync settings
    pub fn register_view(&self, view_id: String, settings: ViewSyncSettings) {
        self.view_settings.write().insert(view_id, settings);
    }

    /// Unregister a view
    pub fn unregister_view(&self, view_id: &str) {
        self.view_settings.write().remove(view_id);
    }

    /// Freeze or unfreeze a registered view
    pub fn set_frozen(&self, view_id: &str, frozen: bool) {
        if let Some(settings) = self.view_settings.write().get_mut(view_id) {
            settings.frozen = frozen;
        }
    }

    /// Check if a view should receive new snapshots
    pub fn should_sync(&self, view_id: &str) -> bool {
        self.view_settings
            .read()
            .get(view_id)
            .map(|s| !s.frozen)
            .unwrap_or(true)
    }
}

impl Default for SyncManager {
    fn default() -> Self {
        Self::new()
    }
}
