//! Agent configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::controller::BackoffConfig;
use super::serde_utils::duration_secs;
use crate::types::TransportKind;

/// Configuration for the client agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Controller duplex address to connect to (primary transport)
    pub controller_duplex_addr: String,

    /// Controller HTTP base URL (used by the deprecated polling
    /// transport and for result posting when polling)
    pub controller_http_url: String,

    /// Which transport to run. Polling is deprecated; duplex is the
    /// default.
    pub transport: TransportKind,

    /// Path to the persisted agent identity file
    pub identity_path: PathBuf,

    /// Polling interval for the deprecated polling transport
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,

    /// Hard wall-clock timeout for a single command execution
    #[serde(with = "duration_secs")]
    pub exec_timeout: Duration,

    /// Timeout for connecting to the controller or to SSH hosts
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Bound on establishing a jump-host forwarding path
    #[serde(with = "duration_secs")]
    pub tunnel_open_timeout: Duration,

    /// Idle tunnels past this age are reaped
    #[serde(with = "duration_secs")]
    pub tunnel_idle_timeout: Duration,

    /// Backoff configuration for reconnections and poll errors
    pub backoff: BackoffConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            controller_duplex_addr: "localhost:7600".to_string(),
            controller_http_url: "http://localhost:7601".to_string(),
            transport: TransportKind::Duplex,
            identity_path: super::default_config_dir().join("agent_id"),
            poll_interval: Duration::from_secs(10),
            exec_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
            tunnel_open_timeout: Duration::from_secs(20),
            tunnel_idle_timeout: Duration::from_secs(300),
            backoff: BackoffConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_transport_is_duplex() {
        assert_eq!(AgentConfig::default().transport, TransportKind::Duplex);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AgentConfig =
            toml::from_str(r#"controller_duplex_addr = "relay.example.com:7600""#).unwrap();
        assert_eq!(config.controller_duplex_addr, "relay.example.com:7600");
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.exec_timeout, Duration::from_secs(300));
    }
}
