//! Wire message types.
//!
//! Every unit on the wire is one JSON object carrying at least a
//! `messageID` and a `command`. Replies additionally carry a `response`
//! status code; everything without one is a notification. All other
//! fields are command-specific and kept verbatim in [`Message::payload`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

// ── Command names ────────────────────────────────────────────────────

/// Bulk attribute query.
pub const GET_PARAM_LIST: &str = "GetParamList";
/// Subscribe to push updates for specific object attributes.
pub const REQUEST_PARAM_LIST: &str = "RequestParamList";
/// Change object attributes.
pub const SET_PARAM_LIST: &str = "SETPARAMLIST";
/// Push notification carrying attribute changes.
pub const NOTIFY_LIST: &str = "NotifyList";

/// Response code for a successful command.
pub const SUCCESS: &str = "200";

/// Object name placeholder meaning "every object matching the condition".
pub const ALL_OBJECTS: &str = "INCR";

/// Command-specific fields of a message.
pub type Payload = Map<String, Value>;

// ── Message ──────────────────────────────────────────────────────────

/// One decoded protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "messageID")]
    pub message_id: String,

    pub command: String,

    /// Status code, present only on replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    /// All remaining fields, e.g. `objectList` or `condition`.
    #[serde(flatten)]
    pub payload: Payload,
}

impl Message {
    /// Build an outgoing request.
    pub fn request(message_id: impl Into<String>, command: impl Into<String>, payload: Payload) -> Self {
        Self {
            message_id: message_id.into(),
            command: command.into(),
            response: None,
            payload,
        }
    }

    pub fn is_response(&self) -> bool {
        self.response.is_some()
    }

    pub fn is_success(&self) -> bool {
        self.response.as_deref() == Some(SUCCESS)
    }

    /// Decode the `objectList` field. A message without one yields an
    /// empty list.
    pub fn object_list(&self) -> Result<Vec<ObjectEntry>, serde_json::Error> {
        match self.payload.get("objectList") {
            Some(list) => Vec::<ObjectEntry>::deserialize(list),
            None => Ok(Vec::new()),
        }
    }
}

// ── Object lists ─────────────────────────────────────────────────────

/// One `{objnam, params}` element of an `objectList`.
///
/// Used for bulk query results, change requests, and notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub objnam: String,
    #[serde(default)]
    pub params: Payload,
}

impl ObjectEntry {
    pub fn new(objnam: impl Into<String>, params: Payload) -> Self {
        Self {
            objnam: objnam.into(),
            params,
        }
    }
}

/// One `{objnam, keys}` element of a query `objectList`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamQuery {
    pub objnam: String,
    pub keys: Vec<String>,
}

// ── Payload builders ─────────────────────────────────────────────────

/// Payload for a `GetParamList` over every object matching `condition`.
///
/// An empty condition matches all objects.
pub fn get_param_list(condition: &str, keys: &[String]) -> Payload {
    to_payload(json!({
        "condition": condition,
        "objectList": [{ "objnam": ALL_OBJECTS, "keys": keys }],
    }))
}

/// Payload for a `RequestParamList` subscription.
pub fn request_param_list(queries: &[ParamQuery]) -> Payload {
    to_payload(json!({ "objectList": queries }))
}

/// Payload for a `SETPARAMLIST` change on a single object.
pub fn set_param_list<'a, I>(objnam: &str, changes: I) -> Payload
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let params: Payload = changes
        .into_iter()
        .map(|(k, v)| (k.to_owned(), Value::String(v.to_owned())))
        .collect();
    to_payload(json!({ "objectList": [{ "objnam": objnam, "params": params }] }))
}

fn to_payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}
