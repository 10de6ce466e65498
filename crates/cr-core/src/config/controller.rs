//! Controller configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Configuration for the controller daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Address to bind the duplex TCP server to
    pub bind_duplex: String,

    /// Address to bind the HTTP API to
    pub bind_http: String,

    /// No contact for this long and an agent is considered disconnected;
    /// the next sweep evicts it and discards its queue
    #[serde(with = "duration_secs")]
    pub liveness_timeout: Duration,

    /// Interval between registry sweeps
    #[serde(with = "duration_secs")]
    pub sweep_interval: Duration,

    /// Interval between duplex heartbeat pings. Distinct from the
    /// liveness timeout: this detects half-open connections, the
    /// liveness timeout detects silent agents.
    #[serde(with = "duration_secs")]
    pub heartbeat_interval: Duration,

    /// No heartbeat ack (or any frame) for this long closes the
    /// duplex connection
    #[serde(with = "duration_secs")]
    pub heartbeat_timeout: Duration,

    /// Maximum number of concurrent duplex connections
    pub max_connections: Option<u32>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            bind_duplex: "0.0.0.0:7600".to_string(),
            bind_http: "0.0.0.0:7601".to_string(),
            liveness_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(90),
            max_connections: None,
        }
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_secs")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_secs")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}
