// ── Domain model ──
//
// Appliance objects as the controller mirrors them: a flat map of
// object name → typed attribute bag, plus the derived system view.

pub mod attributes;
mod object;
mod pool;
mod system;

pub use attributes::AttributeTable;
pub use object::PoolObject;
pub use pool::{ChangeSet, PoolModel};
pub use system::{SystemInfo, unique_id};
