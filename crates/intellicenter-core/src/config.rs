// ── Runtime connection configuration ──
//
// These types describe *how* to reach an IntelliCenter appliance and how
// hard to try when it goes away. They never touch disk: the CLI (or any
// other host) builds a `ControllerConfig` and hands it in.

use std::time::Duration;

pub use intellicenter_api::ProtocolConfig;

/// Default TCP port of the IntelliCenter JSON protocol.
pub const DEFAULT_PORT: u16 = 6681;

/// Retry pacing for the reconnection supervisor.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first retry after a failed start.
    pub initial_delay: Duration,
    /// Growth factor applied to the previous delay; whole seconds, floored.
    pub multiplier: f64,
    /// Upper bound on a single retry delay.
    pub max_delay: Duration,
    /// How long a disconnect may last before consumers hear about it.
    pub disconnect_debounce: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(30),
            multiplier: 1.5,
            max_delay: Duration::from_secs(600),
            disconnect_debounce: Duration::from_secs(15),
        }
    }
}

/// Configuration for one appliance.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Hostname or IP address.
    pub host: String,
    pub port: u16,
    /// Bound on TCP connection establishment.
    pub connect_timeout: Duration,
    pub protocol: ProtocolConfig,
    pub reconnect: ReconnectConfig,
}

impl ControllerConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// `host:port` as handed to the socket layer.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(10),
            protocol: ProtocolConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}
