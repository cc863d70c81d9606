// ── In-memory object model ──
//
// Mapping of object name → `PoolObject` for every tracked object on the
// appliance. Built fresh on each controller start, then kept current by
// `NotifyList` deltas for the life of the connection.

use std::sync::Arc;

use indexmap::IndexMap;
use intellicenter_api::{ObjectEntry, ParamQuery};
use serde::Serialize;

use super::attributes::AttributeTable;
use super::object::PoolObject;
use crate::convert::{Attributes, to_attributes};

/// Changed attributes per object, in the order the appliance sent them.
pub type ChangeSet = IndexMap<String, Attributes>;

#[derive(Debug, Clone, Serialize)]
pub struct PoolModel {
    #[serde(skip)]
    table: Arc<AttributeTable>,
    objects: IndexMap<String, PoolObject>,
}

impl PoolModel {
    pub fn new(table: AttributeTable) -> Self {
        Self {
            table: Arc::new(table),
            objects: IndexMap::new(),
        }
    }

    pub fn table(&self) -> &AttributeTable {
        &self.table
    }

    /// Same tracking table, no objects.
    pub fn cleared(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            objects: IndexMap::new(),
        }
    }

    // ── Loading ──────────────────────────────────────────────────────

    /// Add a fully described object, or merge into it if already known.
    ///
    /// New objects need an `OBJTYP` present in the tracking table.
    /// Returns `true` if the object is in the model afterwards.
    pub fn add_object(&mut self, objnam: &str, attributes: Attributes) -> bool {
        if let Some(existing) = self.objects.get_mut(objnam) {
            existing.update(attributes);
            return true;
        }
        match PoolObject::new(objnam, attributes) {
            Some(obj) if self.table.is_tracked(obj.objtype()) => {
                self.objects.insert(objnam.to_owned(), obj);
                true
            }
            Some(_) => false,
            None => {
                tracing::debug!(objnam, "skipping object without OBJTYP");
                false
            }
        }
    }

    /// [`add_object`](Self::add_object) for a whole object list. Returns
    /// how many entries ended up in the model.
    pub fn add_objects(&mut self, entries: &[ObjectEntry]) -> usize {
        entries
            .iter()
            .filter(|entry| self.add_object(&entry.objnam, to_attributes(&entry.params)))
            .count()
    }

    /// Merge notification deltas. Updates for unknown objects are
    /// ignored; only attributes whose value changed are reported.
    pub fn apply_updates(&mut self, entries: &[ObjectEntry]) -> ChangeSet {
        let mut changes = ChangeSet::new();
        for entry in entries {
            let Some(obj) = self.objects.get_mut(&entry.objnam) else {
                tracing::trace!(objnam = %entry.objnam, "update for untracked object ignored");
                continue;
            };
            let changed = obj.update(to_attributes(&entry.params));
            if !changed.is_empty() {
                changes.entry(entry.objnam.clone()).or_default().extend(changed);
            }
        }
        changes
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn get(&self, objnam: &str) -> Option<&PoolObject> {
        self.objects.get(objnam)
    }

    pub fn contains(&self, objnam: &str) -> bool {
        self.objects.contains_key(objnam)
    }

    pub fn objects(&self) -> impl Iterator<Item = &PoolObject> {
        self.objects.values()
    }

    pub fn objects_of_type<'a>(&'a self, objtype: &'a str) -> impl Iterator<Item = &'a PoolObject> {
        self.objects().filter(move |obj| obj.objtype() == objtype)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Every attribute worth requesting in the initial bulk query.
    pub fn attributes_to_track(&self) -> Vec<String> {
        self.table.union()
    }

    /// Per-object subscription queries, in model order.
    pub fn subscriptions(&self) -> Vec<ParamQuery> {
        self.objects()
            .filter_map(|obj| {
                let keys = obj.tracked_attributes(&self.table);
                (!keys.is_empty()).then(|| ParamQuery {
                    objnam: obj.objnam().to_owned(),
                    keys: keys.to_vec(),
                })
            })
            .collect()
    }
}

impl Default for PoolModel {
    fn default() -> Self {
        Self::new(AttributeTable::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::attributes::{BODY_TYPE, CIRCUIT_TYPE};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn entry(value: serde_json::Value) -> ObjectEntry {
        serde_json::from_value(value).unwrap()
    }

    fn table() -> AttributeTable {
        AttributeTable::empty()
            .with_type(CIRCUIT_TYPE, &["SNAME", "STATUS"])
            .with_type(BODY_TYPE, &["SNAME", "TEMP"])
    }

    fn loaded() -> PoolModel {
        let mut model = PoolModel::new(table());
        model.add_objects(&[
            entry(json!({ "objnam": "CIRC01", "params": { "OBJTYP": "CIRCUIT", "SNAME": "Spa Light", "STATUS": "OFF" } })),
            entry(json!({ "objnam": "B1101", "params": { "OBJTYP": "BODY", "SUBTYP": "POOL", "TEMP": "80" } })),
            entry(json!({ "objnam": "REM01", "params": { "OBJTYP": "REMOTE", "SNAME": "Remote" } })),
        ]);
        model
    }

    #[test]
    fn untracked_types_are_filtered() {
        let model = loaded();
        assert_eq!(model.len(), 2);
        assert!(model.get("REM01").is_none());
    }

    #[test]
    fn notify_delta_reports_changed_attributes() {
        let mut model = loaded();
        let changes = model.apply_updates(&[entry(json!({ "objnam": "CIRC01", "params": { "STATUS": "ON" } }))]);

        let mut expected = ChangeSet::new();
        expected.insert("CIRC01".into(), Attributes::from([("STATUS".to_owned(), "ON".to_owned())]));
        assert_eq!(changes, expected);
        assert_eq!(model.get("CIRC01").unwrap().status(), Some("ON"));
    }

    #[test]
    fn merge_is_idempotent() {
        let mut model = loaded();
        let delta = [entry(json!({ "objnam": "B1101", "params": { "TEMP": "82" } }))];

        assert_eq!(model.apply_updates(&delta).len(), 1);
        let after_once = model.get("B1101").cloned();
        assert!(model.apply_updates(&delta).is_empty());
        assert_eq!(model.get("B1101").cloned(), after_once);
    }

    #[test]
    fn unknown_object_updates_are_ignored() {
        let mut model = loaded();
        let changes = model.apply_updates(&[entry(json!({ "objnam": "GHOST", "params": { "OBJTYP": "CIRCUIT", "STATUS": "ON" } }))]);
        assert!(changes.is_empty());
        assert!(!model.contains("GHOST"));
        assert_eq!(model.len(), 2);
    }

    #[test]
    fn add_object_merges_into_existing() {
        let mut model = loaded();
        assert_eq!(
            model.add_objects(&[entry(json!({ "objnam": "CIRC01", "params": { "STATUS": "ON" } }))]),
            1
        );
        let circ = model.get("CIRC01").unwrap();
        assert_eq!(circ.status(), Some("ON"));
        assert_eq!(circ.sname(), Some("Spa Light"));
    }

    #[test]
    fn subscriptions_follow_table() {
        let model = loaded();
        let subs = model.subscriptions();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].objnam, "CIRC01");
        assert_eq!(subs[0].keys, ["SNAME", "STATUS"]);
        assert_eq!(subs[1].keys, ["SNAME", "TEMP"]);
    }

    #[test]
    fn objects_of_type_filters() {
        let model = loaded();
        let bodies: Vec<_> = model.objects_of_type(BODY_TYPE).map(PoolObject::objnam).collect();
        assert_eq!(bodies, ["B1101"]);
    }
}
