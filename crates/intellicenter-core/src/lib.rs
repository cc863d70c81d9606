// intellicenter-core: Object model, controller and supervisor between intellicenter-api and consumers.

pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod model;
pub mod store;
pub mod stream;
pub mod supervisor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ControllerConfig, DEFAULT_PORT, ProtocolConfig, ReconnectConfig};
pub use controller::{ConnectionState, Controller};
pub use convert::Attributes;
pub use error::CoreError;
pub use store::{ModelStore, ModelUpdate};
pub use stream::{ModelStream, ModelWatchStream};
pub use supervisor::{Connector, LifecycleEvent, Supervisor, SupervisorState};

pub use model::{AttributeTable, ChangeSet, PoolModel, PoolObject, SystemInfo};
