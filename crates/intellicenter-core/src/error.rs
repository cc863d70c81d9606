// ── Core error types ──
//
// User-facing errors from intellicenter-core. Consumers never see raw
// framing or JSON failures; the `From<intellicenter_api::Error>` impl
// translates session-layer errors into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to appliance at {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Appliance connection timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Controller disconnected")]
    ControllerDisconnected,

    #[error("Request cancelled: {reason}")]
    Cancelled { reason: String },

    // ── Command errors ───────────────────────────────────────────────
    #[error("Command {command} rejected by appliance (response code {code})")]
    CommandFailed { command: String, code: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Object not found: {objnam}")]
    ObjectNotFound { objnam: String },

    #[error("Unexpected response from appliance: {message}")]
    Protocol { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Response code reported by the appliance, if any.
    pub fn response_code(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether trying again later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::Timeout { .. }
                | Self::ControllerDisconnected
                | Self::Cancelled { .. }
        )
    }
}

// ── Conversion from session-layer errors ─────────────────────────────

impl From<intellicenter_api::Error> for CoreError {
    fn from(err: intellicenter_api::Error) -> Self {
        use intellicenter_api::Error as Api;

        match err {
            Api::Connect { addr, source } => CoreError::ConnectionFailed {
                address: addr,
                reason: source.to_string(),
            },
            Api::ConnectTimeout { timeout_secs, .. } => CoreError::Timeout { timeout_secs },
            Api::Io(e) => CoreError::ConnectionFailed {
                address: String::new(),
                reason: e.to_string(),
            },
            Api::InvalidFrame(message) => CoreError::Protocol { message },
            Api::Json(e) => CoreError::Protocol {
                message: e.to_string(),
            },
            Api::Command { command, code } => CoreError::CommandFailed { command, code },
            Api::Closed => CoreError::ControllerDisconnected,
            Api::Cancelled => CoreError::Cancelled {
                reason: "connection torn down".into(),
            },
            Api::FlowStalled => CoreError::Cancelled {
                reason: "appliance stopped answering; request abandoned".into(),
            },
        }
    }
}
