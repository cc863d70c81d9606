use serde::Serialize;

use super::attributes::{
    AttributeTable, CIRCUIT_TYPE, FEATR_ATTR, LIGHT_SUBTYPES, OBJTYP_ATTR, ON, SNAME_ATTR, STATUS_ATTR,
    SUBTYP_ATTR,
};
use crate::convert::Attributes;

/// One addressable appliance object: a body, circuit, pump, heater...
///
/// `objtype` and `subtype` are fixed when the object is first seen; later
/// updates only touch the attribute bag. All values are kept as the
/// strings the appliance sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolObject {
    objnam: String,
    objtype: String,
    subtype: Option<String>,
    attributes: Attributes,
}

impl PoolObject {
    /// Build from a first-seen attribute set. Returns `None` if it lacks
    /// an `OBJTYP`.
    pub fn new(objnam: impl Into<String>, mut attributes: Attributes) -> Option<Self> {
        let objtype = attributes.shift_remove(OBJTYP_ATTR)?;
        let subtype = attributes.shift_remove(SUBTYP_ATTR);
        Some(Self {
            objnam: objnam.into(),
            objtype,
            subtype,
            attributes,
        })
    }

    /// Merge a partial update. Returns the attributes whose value actually
    /// changed; type keys are ignored.
    pub fn update(&mut self, changes: Attributes) -> Attributes {
        let mut changed = Attributes::new();
        for (key, value) in changes {
            if key == OBJTYP_ATTR || key == SUBTYP_ATTR {
                continue;
            }
            if self.attributes.get(&key) != Some(&value) {
                self.attributes.insert(key.clone(), value.clone());
                changed.insert(key, value);
            }
        }
        changed
    }

    pub fn objnam(&self) -> &str {
        &self.objnam
    }

    pub fn objtype(&self) -> &str {
        &self.objtype
    }

    pub fn subtype(&self) -> Option<&str> {
        self.subtype.as_deref()
    }

    /// Attribute value by name. `OBJTYP` and `SUBTYP` resolve to the
    /// fixed type fields.
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            OBJTYP_ATTR => Some(&self.objtype),
            SUBTYP_ATTR => self.subtype(),
            _ => self.attributes.get(key).map(String::as_str),
        }
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Attributes the model subscribes to for this object's type.
    pub fn tracked_attributes<'a>(&self, table: &'a AttributeTable) -> &'a [String] {
        table.attributes_for(&self.objtype)
    }

    // ── Conveniences ─────────────────────────────────────────────────

    /// Friendly name.
    pub fn sname(&self) -> Option<&str> {
        self.get(SNAME_ATTR)
    }

    pub fn status(&self) -> Option<&str> {
        self.get(STATUS_ATTR)
    }

    pub fn is_on(&self) -> bool {
        self.status() == Some(ON)
    }

    /// Shown in the appliance's "features" menu.
    pub fn is_featured(&self) -> bool {
        self.get(FEATR_ATTR) == Some(ON)
    }

    pub fn is_a_light(&self) -> bool {
        self.objtype == CIRCUIT_TYPE && self.subtype().is_some_and(|s| LIGHT_SUBTYPES.contains(&s))
    }
}
