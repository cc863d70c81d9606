use serde::Serialize;
use sha2::{Digest, Sha256};

use super::attributes::{MODE_ATTR, PROPNAME_ATTR, SNAME_ATTR, VER_ATTR};
use super::object::PoolObject;
use crate::convert::Attributes;

/// `MODE` value for metric units.
const METRIC: &str = "METRIC";

/// Length of the unique id in bytes before hex encoding.
const UNIQUE_ID_BYTES: usize = 8;

/// Read-only view of the appliance's system object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    pub objnam: String,
    /// Property (installation) name.
    pub prop_name: String,
    pub sw_version: String,
    pub uses_metric: bool,
    pub sname: String,
    /// Stable across restarts and address changes: derived from `SNAME`.
    pub unique_id: String,
}

impl SystemInfo {
    pub fn from_attributes(objnam: impl Into<String>, attributes: &Attributes) -> Self {
        let field = |key: &str| attributes.get(key).cloned().unwrap_or_default();
        let sname = field(SNAME_ATTR);
        Self {
            objnam: objnam.into(),
            prop_name: field(PROPNAME_ATTR),
            sw_version: field(VER_ATTR),
            uses_metric: attributes.get(MODE_ATTR).is_some_and(|m| m == METRIC),
            unique_id: unique_id(&sname),
            sname,
        }
    }

    pub fn from_object(obj: &PoolObject) -> Self {
        Self::from_attributes(obj.objnam(), obj.attributes())
    }

    /// Apply changed attributes of the system object. The unique id is
    /// never recomputed. Returns `true` if any field changed.
    pub fn update(&mut self, changes: &Attributes) -> bool {
        let before = self.clone();
        if let Some(name) = changes.get(PROPNAME_ATTR) {
            self.prop_name.clone_from(name);
        }
        if let Some(version) = changes.get(VER_ATTR) {
            self.sw_version.clone_from(version);
        }
        if let Some(mode) = changes.get(MODE_ATTR) {
            self.uses_metric = mode == METRIC;
        }
        *self != before
    }
}

/// First eight bytes of SHA-256 over the system name, hex encoded.
pub fn unique_id(sname: &str) -> String {
    let digest = Sha256::digest(sname.as_bytes());
    hex::encode(&digest[..UNIQUE_ID_BYTES])
}
