//! Shared configuration for IntelliCenter tools.
//!
//! TOML profiles layered with environment overrides, and translation to
//! `intellicenter_core::ControllerConfig`. The CLI adds flag overrides on
//! top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use intellicenter_core::{ControllerConfig, DEFAULT_PORT, ProtocolConfig, ReconnectConfig};

/// Prefix for environment overrides, e.g. `INTELLICENTER_DEFAULTS__OUTPUT`.
pub const ENV_PREFIX: &str = "INTELLICENTER_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named appliance profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile, falling back to `default_profile` when `name`
    /// is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Connect timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}

/// A named appliance profile. Durations are whole seconds; anything left
/// out keeps the library default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Hostname or IP address of the appliance.
    pub host: String,

    pub port: Option<u16>,

    /// Override the connect timeout.
    pub timeout: Option<u64>,

    pub keepalive_interval: Option<u64>,
    pub idle_timeout: Option<u64>,
    pub flow_stall_timeout: Option<u64>,

    /// First retry delay after a failed start.
    pub reconnect_delay: Option<u64>,
    pub reconnect_max_delay: Option<u64>,
    pub disconnect_debounce: Option<u64>,
}

impl Profile {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "intellicenter", "intellicenter").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("intellicenter");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file + environment. A missing file is not an
/// error; defaults apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ControllerConfig` from a profile. `defaults.timeout` applies
/// when the profile sets no timeout of its own.
pub fn profile_to_controller_config(profile: &Profile, defaults: &Defaults) -> Result<ControllerConfig, ConfigError> {
    let host = profile.host.trim();
    if host.is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }
    let port = profile.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(ConfigError::Validation {
            field: "port".into(),
            reason: "must be between 1 and 65535".into(),
        });
    }

    let secs = |value: Option<u64>, fallback: Duration| value.map_or(fallback, Duration::from_secs);
    let base = ProtocolConfig::default();
    let protocol = ProtocolConfig {
        keepalive_interval: secs(profile.keepalive_interval, base.keepalive_interval),
        idle_timeout: secs(profile.idle_timeout, base.idle_timeout),
        flow_stall_timeout: secs(profile.flow_stall_timeout, base.flow_stall_timeout),
        ..base
    };
    if protocol.idle_timeout <= protocol.keepalive_interval {
        return Err(ConfigError::Validation {
            field: "idle_timeout".into(),
            reason: format!(
                "must exceed keepalive_interval ({}s)",
                protocol.keepalive_interval.as_secs()
            ),
        });
    }

    let base = ReconnectConfig::default();
    let reconnect = ReconnectConfig {
        initial_delay: secs(profile.reconnect_delay, base.initial_delay),
        max_delay: secs(profile.reconnect_max_delay, base.max_delay),
        disconnect_debounce: secs(profile.disconnect_debounce, base.disconnect_debounce),
        ..base
    };
    if reconnect.initial_delay.is_zero() {
        return Err(ConfigError::Validation {
            field: "reconnect_delay".into(),
            reason: "must be at least one second".into(),
        });
    }

    Ok(ControllerConfig {
        host: host.to_owned(),
        port,
        connect_timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        protocol,
        reconnect,
    })
}
