use thiserror::Error;

/// Top-level error type for the `intellicenter-api` crate.
///
/// Covers every failure mode of a single appliance session: establishing
/// the TCP connection, framing and decoding, command errors reported by
/// the appliance, and requests abandoned when the session goes away.
/// `intellicenter-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// TCP connection could not be established.
    #[error("Cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// TCP connection was not established within the configured window.
    #[error("Connection to {addr} timed out after {timeout_secs}s")]
    ConnectTimeout { addr: String, timeout_secs: u64 },

    /// Socket read or write failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Framing / decoding ──────────────────────────────────────────
    /// A frame was not valid UTF-8. Fatal to the connection.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Appliance ───────────────────────────────────────────────────
    /// The appliance answered with a non-success response code.
    #[error("Command {command} failed with response code {code}")]
    Command { command: String, code: String },

    // ── Lifecycle ───────────────────────────────────────────────────
    /// The connection is closed; nothing was sent.
    #[error("Connection closed")]
    Closed,

    /// The connection was torn down while the request was pending.
    #[error("Request cancelled: connection torn down")]
    Cancelled,

    /// Flow control was reset after a stall while the request was pending.
    #[error("Request abandoned after flow-control stall")]
    FlowStalled,
}

impl Error {
    /// The appliance response code, if this is a command error.
    pub fn response_code(&self) -> Option<&str> {
        match self {
            Self::Command { code, .. } => Some(code),
            _ => None,
        }
    }
}
