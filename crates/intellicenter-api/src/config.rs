use std::time::Duration;

/// Timing parameters for one appliance session.
///
/// The keepalive interval must stay below the idle timeout, otherwise a
/// quiet but healthy connection is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Period of the connection monitor tick.
    pub heartbeat_interval: Duration,
    /// Outstanding request with no flow activity for this long triggers a
    /// flow-control reset.
    pub flow_stall_timeout: Duration,
    /// Minimum gap between keepalive queries.
    pub keepalive_interval: Duration,
    /// No bytes received for this long closes the connection.
    pub idle_timeout: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            flow_stall_timeout: Duration::from_secs(45),
            keepalive_interval: Duration::from_secs(90),
            idle_timeout: Duration::from_secs(300),
        }
    }
}
