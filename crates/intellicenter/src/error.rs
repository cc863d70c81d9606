//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use intellicenter_config::ConfigError;
use intellicenter_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to IntelliCenter at {address}")]
    #[diagnostic(
        code(intellicenter::connection_failed),
        help(
            "Check that the appliance is powered and reachable on your network.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { address: String, reason: String },

    #[error("Connection to the appliance was lost: {reason}")]
    #[diagnostic(code(intellicenter::disconnected))]
    Disconnected { reason: String },

    #[error("Timed out after {seconds}s")]
    #[diagnostic(
        code(intellicenter::timeout),
        help("Increase the timeout with --timeout or check the appliance.")
    )]
    Timeout { seconds: u64 },

    // ── Appliance ────────────────────────────────────────────────────

    #[error("Object '{objnam}' not found")]
    #[diagnostic(
        code(intellicenter::not_found),
        help("Run: intellicenter objects to see tracked objects")
    )]
    NotFound { objnam: String },

    #[error("Appliance rejected {command} with code {code}")]
    #[diagnostic(code(intellicenter::rejected))]
    Rejected { command: String, code: String },

    #[error("Unexpected reply from the appliance: {message}")]
    #[diagnostic(code(intellicenter::protocol))]
    Protocol { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(intellicenter::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(intellicenter::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: intellicenter config init --host <HOST>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No appliance configured")]
    #[diagnostic(
        code(intellicenter::no_config),
        help(
            "Pass --host, or create a profile with: intellicenter config init --host <HOST>\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Profile '{name}' already exists")]
    #[diagnostic(
        code(intellicenter::profile_exists),
        help("Use --force to overwrite it.")
    )]
    ProfileExists { name: String },

    #[error(transparent)]
    #[diagnostic(code(intellicenter::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    #[diagnostic(code(intellicenter::json))]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    #[diagnostic(code(intellicenter::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Disconnected { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Validation { .. } | Self::NoConfig { .. } | Self::ProfileExists { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { address, reason } => CliError::ConnectionFailed { address, reason },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::ControllerDisconnected => CliError::Disconnected {
                reason: "no open session".into(),
            },

            CoreError::Cancelled { reason } => CliError::Disconnected { reason },

            CoreError::CommandFailed { command, code } => CliError::Rejected { command, code },

            CoreError::ObjectNotFound { objnam } => CliError::NotFound { objnam },

            CoreError::Protocol { message } => CliError::Protocol { message },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
