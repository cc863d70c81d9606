// ── Object types and tracked attributes ──
//
// IntelliCenter objects carry dozens of attributes, most of them
// configuration nobody watches. The model only tracks the types listed
// here and, per type, subscribes to the listed attributes.

use std::collections::BTreeSet;

use indexmap::IndexMap;

// ── Well-known attribute names ───────────────────────────────────────

pub const OBJTYP_ATTR: &str = "OBJTYP";
pub const SUBTYP_ATTR: &str = "SUBTYP";
pub const SNAME_ATTR: &str = "SNAME";
pub const STATUS_ATTR: &str = "STATUS";
pub const FEATR_ATTR: &str = "FEATR";
pub const MODE_ATTR: &str = "MODE";
pub const PROPNAME_ATTR: &str = "PROPNAME";
pub const VER_ATTR: &str = "VER";
pub const NORMAL_ATTR: &str = "NORMAL";

// ── Object types ─────────────────────────────────────────────────────

pub const BODY_TYPE: &str = "BODY";
pub const CIRCUIT_TYPE: &str = "CIRCUIT";
pub const CIRCGRP_TYPE: &str = "CIRCGRP";
pub const PUMP_TYPE: &str = "PUMP";
pub const HEATER_TYPE: &str = "HEATER";
pub const SENSE_TYPE: &str = "SENSE";
pub const CHEM_TYPE: &str = "CHEM";
pub const SCHED_TYPE: &str = "SCHED";
pub const SYSTEM_TYPE: &str = "SYSTEM";
pub const EXTINSTR_TYPE: &str = "EXTINSTR";
pub const VALVE_TYPE: &str = "VALVE";

/// Circuit subtypes that drive a light.
pub const LIGHT_SUBTYPES: &[&str] = &["LIGHT", "INTELLI", "GLOW", "GLOWT", "DIMMER", "MAGIC2"];

/// Value of `STATUS`/`FEATR` for "on".
pub const ON: &str = "ON";
pub const OFF: &str = "OFF";

// ── Per-type attribute lists ─────────────────────────────────────────

const BODY_ATTRIBUTES: &[&str] = &[
    "ACT1", "ACT2", "ACT3", "ACT4", "HEATER", "HITMP", "HNAME", "HTMODE", "HTSRC", "LISTORD",
    "LOTMP", "LSTTMP", "PARENT", "PRIM", "READY", "SEC", "SELECT", "SETPT", "SHARE", "SNAME",
    "STATIC", "STATUS", "SUBTYP", "TEMP", "VOL",
];

const CIRCUIT_ATTRIBUTES: &[&str] = &[
    "ACT", "BODY", "CHILD", "COVER", "DNTSTP", "FEATR", "FREEZE", "HNAME", "LIMIT", "LISTORD",
    "OBJLIST", "PARENT", "READY", "SELECT", "SET", "SHOMNU", "SNAME", "STATIC", "STATUS",
    "SUBTYP", "SWIM", "SYNC", "TIME", "USAGE", "USE",
];

const CIRCGRP_ATTRIBUTES: &[&str] = &["ACT", "CIRCUIT", "DLY", "LISTORD", "PARENT", "READY", "STATIC"];

const PUMP_ATTRIBUTES: &[&str] = &[
    "BODY", "CIRCUIT", "COMUART", "GPM", "HNAME", "LISTORD", "MAX", "MAXF", "MIN", "MINF",
    "NAME", "PRIM", "PRIMFLO", "PRIMTIM", "PWR", "RPM", "SETTMP", "SETTMPNC", "SNAME", "STATUS",
    "SUBTYP", "SYSTIM",
];

const HEATER_ATTRIBUTES: &[&str] = &[
    "BODY", "BOOST", "COMUART", "COOL", "DLY", "HNAME", "HTMODE", "LISTORD", "PARENT", "READY",
    "SHOMNU", "SNAME", "START", "STATIC", "STATUS", "STOP", "SUBTYP", "TIME",
];

const SENSE_ATTRIBUTES: &[&str] = &[
    "CALIB", "HNAME", "LISTORD", "MODE", "NAME", "PARENT", "PROBE", "SNAME", "SOURCE", "STATIC",
    "STATUS", "SUBTYP",
];

const CHEM_ATTRIBUTES: &[&str] = &[
    "ALK", "BODY", "CALC", "CHLOR", "COMUART", "CYACID", "LISTORD", "ORPTNK", "ORPVAL", "PHTNK",
    "PHVAL", "PRIM", "QUALTY", "SALT", "SEC", "SHARE", "SNAME", "SUPER", "TIMOUT",
];

const SCHED_ATTRIBUTES: &[&str] = &[
    "ACT", "CIRCUIT", "DAY", "DNTSTP", "HEATER", "HITMP", "HNAME", "LISTORD", "LOTMP", "SINGLE",
    "SMTSRT", "SNAME", "START", "STATIC", "STATUS", "STOP", "TIME", "TIMOUT", "UPDATE", "VACFLO",
];

const SYSTEM_ATTRIBUTES: &[&str] = &[
    "ACT", "ADDRESS", "AVAIL", "CITY", "COUNTRY", "HEATING", "HNAME", "LOCX", "LOCY", "MANHT",
    "MODE", "NAME", "PROPNAME", "SERVICE", "SNAME", "START", "STATE", "STATUS", "STOP", "TEMPNC",
    "TIMZON", "VACFLO", "VALVE", "VER", "ZIP",
];

const EXTINSTR_ATTRIBUTES: &[&str] = &[
    "BODY", "HNAME", "LISTORD", "NORMAL", "PARENT", "SNAME", "STATIC", "STATUS", "SUBTYP",
];

const VALVE_ATTRIBUTES: &[&str] = &["ASSIGN", "CIRCUIT", "DLY", "HNAME", "PARENT", "SNAME", "STATIC", "SUBTYP"];

// ── AttributeTable ───────────────────────────────────────────────────

/// Object type → attributes tracked for it.
///
/// Objects whose type is absent from the table are ignored by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeTable {
    by_type: IndexMap<String, Vec<String>>,
}

impl AttributeTable {
    /// A table tracking nothing.
    pub fn empty() -> Self {
        Self {
            by_type: IndexMap::new(),
        }
    }

    /// Every type the appliance exposes that is worth mirroring.
    pub fn all_types() -> Self {
        Self::empty()
            .with_type(BODY_TYPE, BODY_ATTRIBUTES)
            .with_type(CIRCUIT_TYPE, CIRCUIT_ATTRIBUTES)
            .with_type(CIRCGRP_TYPE, CIRCGRP_ATTRIBUTES)
            .with_type(PUMP_TYPE, PUMP_ATTRIBUTES)
            .with_type(HEATER_TYPE, HEATER_ATTRIBUTES)
            .with_type(SENSE_TYPE, SENSE_ATTRIBUTES)
            .with_type(CHEM_TYPE, CHEM_ATTRIBUTES)
            .with_type(SCHED_TYPE, SCHED_ATTRIBUTES)
            .with_type(SYSTEM_TYPE, SYSTEM_ATTRIBUTES)
            .with_type(EXTINSTR_TYPE, EXTINSTR_ATTRIBUTES)
            .with_type(VALVE_TYPE, VALVE_ATTRIBUTES)
    }

    /// Add (or replace) the attribute list for `objtype`.
    pub fn with_type(mut self, objtype: &str, attributes: &[&str]) -> Self {
        self.by_type.insert(
            objtype.to_owned(),
            attributes.iter().map(|a| (*a).to_owned()).collect(),
        );
        self
    }

    pub fn is_tracked(&self, objtype: &str) -> bool {
        self.by_type.contains_key(objtype)
    }

    /// Attributes tracked for `objtype`; empty for untracked types.
    pub fn attributes_for(&self, objtype: &str) -> &[String] {
        self.by_type.get(objtype).map(Vec::as_slice).unwrap_or_default()
    }

    /// Sorted union of every tracked attribute plus `OBJTYP` and `SUBTYP`.
    pub fn union(&self) -> Vec<String> {
        let mut all: BTreeSet<&str> = BTreeSet::from([OBJTYP_ATTR, SUBTYP_ATTR]);
        all.extend(self.by_type.values().flatten().map(String::as_str));
        all.into_iter().map(str::to_owned).collect()
    }
}

impl Default for AttributeTable {
    fn default() -> Self {
        Self::all_types()
    }
}
