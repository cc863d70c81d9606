// ── Reactive data store ──
//
// Snapshot storage for the object model with push-based change
// notification.

mod model_store;

pub use model_store::{ModelStore, ModelUpdate};
