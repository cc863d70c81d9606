// ── Reactive model store ──
//
// Holds the current `PoolModel` behind a `watch` channel so readers get
// cheap `Arc` snapshots, and broadcasts one `ModelUpdate` per notification
// that actually changed something.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use intellicenter_api::ObjectEntry;
use tokio::sync::{broadcast, watch};

use crate::model::{AttributeTable, ChangeSet, PoolModel, SystemInfo};
use crate::stream::ModelStream;

const UPDATE_CHANNEL_SIZE: usize = 256;

/// One batch of attribute changes pushed by the appliance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelUpdate {
    pub changes: ChangeSet,
    pub received_at: DateTime<Utc>,
}

pub struct ModelStore {
    model: watch::Sender<Arc<PoolModel>>,
    system: watch::Sender<Option<SystemInfo>>,
    updates: broadcast::Sender<Arc<ModelUpdate>>,
    last_update: watch::Sender<Option<DateTime<Utc>>>,
}

impl ModelStore {
    pub fn new(table: AttributeTable) -> Self {
        let (model, _) = watch::channel(Arc::new(PoolModel::new(table)));
        let (system, _) = watch::channel(None);
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_SIZE);
        let (last_update, _) = watch::channel(None);

        Self {
            model,
            system,
            updates,
            last_update,
        }
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Drop every object and the system view; the tracking table stays.
    pub fn reset(&self) {
        self.model.send_modify(|model| *model = Arc::new(model.cleared()));
        self.system.send_replace(None);
        self.last_update.send_replace(None);
    }

    pub fn set_system_info(&self, info: SystemInfo) {
        self.system.send_replace(Some(info));
    }

    /// Merge bulk query results. Used while loading; publishes a new
    /// snapshot but no [`ModelUpdate`].
    pub fn merge_objects(&self, entries: &[ObjectEntry]) -> usize {
        let mut added = 0;
        self.model.send_modify(|model| {
            added = Arc::make_mut(model).add_objects(entries);
        });
        added
    }

    /// Apply a notification's deltas and tell subscribers what changed.
    ///
    /// Deltas touching the system object also refresh [`SystemInfo`].
    /// Returns the change set (empty if nothing actually changed).
    pub fn apply_notification(&self, entries: &[ObjectEntry]) -> ChangeSet {
        let mut changes = ChangeSet::new();
        self.model.send_if_modified(|model| {
            changes = Arc::make_mut(model).apply_updates(entries);
            !changes.is_empty()
        });

        if changes.is_empty() {
            return changes;
        }

        self.system.send_if_modified(|info| match info {
            Some(info) => changes.get(&info.objnam).is_some_and(|delta| info.update(delta)),
            None => false,
        });

        let now = Utc::now();
        self.last_update.send_replace(Some(now));
        // No receivers is fine.
        let _ = self.updates.send(Arc::new(ModelUpdate {
            changes: changes.clone(),
            received_at: now,
        }));
        changes
    }

    // ── Access ───────────────────────────────────────────────────────

    /// Current model (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<PoolModel> {
        self.model.borrow().clone()
    }

    pub fn system_info(&self) -> Option<SystemInfo> {
        self.system.borrow().clone()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.borrow()
    }

    /// Per-notification change events.
    pub fn updates(&self) -> broadcast::Receiver<Arc<ModelUpdate>> {
        self.updates.subscribe()
    }

    /// Snapshot subscription.
    pub fn subscribe(&self) -> ModelStream {
        ModelStream::new(self.model.subscribe())
    }

    pub fn subscribe_system_info(&self) -> watch::Receiver<Option<SystemInfo>> {
        self.system.subscribe()
    }
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new(AttributeTable::default())
    }
}
