// ── Wire → model conversion ──
//
// The appliance answers a query for an attribute an object does not
// define by echoing the attribute name back as its value (`"FOO": "FOO"`).
// Those echoes are pruned before anything reaches the model.

use indexmap::IndexMap;
use serde_json::Value;

use intellicenter_api::{ObjectEntry, Payload};

/// Attribute bag of a single object, in wire order.
pub type Attributes = IndexMap<String, String>;

/// Remove every `key == value` entry, recursively through maps and lists.
pub fn prune(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(prune).collect()),
        Value::Object(map) => Value::Object(prune_params(map)),
        other => other,
    }
}

/// [`prune`] applied to one parameter map.
pub fn prune_params(params: Payload) -> Payload {
    params
        .into_iter()
        .filter(|(key, value)| value.as_str() != Some(key.as_str()))
        .map(|(key, value)| (key, prune(value)))
        .collect()
}

/// Prune every entry of an object list in place.
pub fn prune_entries(entries: Vec<ObjectEntry>) -> Vec<ObjectEntry> {
    entries
        .into_iter()
        .map(|entry| ObjectEntry::new(entry.objnam, prune_params(entry.params)))
        .collect()
}

/// Attribute values are strings on the wire; anything else (nested lists
/// of child objects, numbers from odd firmware) is kept as compact JSON.
pub fn attribute_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn to_attributes(params: &Payload) -> Attributes {
    params
        .iter()
        .map(|(key, value)| (key.clone(), attribute_value(value)))
        .collect()
}
