//! Wire protocol client for Pentair IntelliCenter pool controllers.
//!
//! The appliance speaks line-delimited JSON over plain TCP (port 6681 by
//! default). This crate owns a single session: framing, the
//! one-request-in-flight discipline the firmware requires, request/response
//! correlation, keepalives and idle detection. It knows nothing about the
//! object model; see `intellicenter-core` for that.

pub mod config;
pub mod connection;
pub mod error;
pub mod flow;
pub mod framing;
pub mod message;
mod monitor;
pub mod pending;

pub use config::ProtocolConfig;
pub use connection::{Connection, Notifications, ResponseHandle};
pub use error::Error;
pub use message::{Message, ObjectEntry, ParamQuery, Payload};
