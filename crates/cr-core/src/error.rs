//! Core error types for c-Relay

use cr_protocol::{ProtocolError, ResultErrorKind};
use std::path::PathBuf;
use thiserror::Error;

use crate::types::AgentId;

/// Top-level error type for the c-Relay ecosystem
#[derive(Error, Debug)]
pub enum RelayError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Registry error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Tunnel error
    #[error("Tunnel error: {0}")]
    Tunnel(#[from] TunnelError),

    /// Execution error
    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Registry-related errors
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Enqueue target was never registered. Policy decision: enqueue to
    /// an unknown agent is rejected, not lazily created.
    #[error("Agent unknown: {0}")]
    AgentUnknown(AgentId),
}

/// Transport-related errors (duplex connection and polling client)
#[derive(Error, Debug)]
pub enum TransportError {
    /// Could not reach the controller
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// Controller refused the registration
    #[error("Registration rejected: {0}")]
    RegistrationRejected(String),

    /// Connection dropped mid-session
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Request was structurally invalid at the boundary
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

/// Tunnel broker errors.
///
/// These surface from `open`; once a tunnel is open, relay failures close
/// the session rather than erroring callers.
#[derive(Error, Debug)]
pub enum TunnelError {
    /// Jump host rejected the credentials
    #[error("Jump host authentication failed: {0}")]
    Auth(String),

    /// Destination unreachable from the jump host
    #[error("Destination {dest} unreachable from jump host: {reason}")]
    Unreachable { dest: String, reason: String },

    /// No forwarding path established within the bound
    #[error("Tunnel to {dest} not established within {timeout_secs}s")]
    Timeout { dest: String, timeout_secs: u64 },

    /// Session id not found for close
    #[error("Tunnel session not found: {0}")]
    SessionNotFound(String),

    /// Local listener or socket failure
    #[error("Tunnel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TunnelError {
    /// Map to the wire-level result kind
    pub fn result_kind(&self) -> ResultErrorKind {
        match self {
            TunnelError::Auth(_) => ResultErrorKind::TunnelAuthError,
            TunnelError::Unreachable { .. } => ResultErrorKind::TunnelUnreachable,
            TunnelError::Timeout { .. } => ResultErrorKind::TunnelTimeout,
            TunnelError::SessionNotFound(_) | TunnelError::Io(_) => {
                ResultErrorKind::TunnelUnreachable
            }
        }
    }
}

/// Execution engine errors.
///
/// Only infrastructure failures live here; a command that runs and exits
/// non-zero is a normal `TaskResult`, not an error.
#[derive(Error, Debug)]
pub enum ExecError {
    /// Command exceeded the wall-clock timeout
    #[error("Execution timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Target host rejected the credentials
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Connection, channel, or spawn failure
    #[error("Execution I/O error: {0}")]
    Io(String),

    /// Secret reference could not be resolved on the agent
    #[error("Secret resolution failed: {0}")]
    Secret(String),

    /// Tunnel setup failed before execution started
    #[error(transparent)]
    Tunnel(#[from] TunnelError),
}

impl ExecError {
    /// Map to the wire-level result kind
    pub fn result_kind(&self) -> ResultErrorKind {
        match self {
            ExecError::Timeout { .. } => ResultErrorKind::ExecutionTimeout,
            ExecError::Auth(_) => ResultErrorKind::ExecutionAuthError,
            ExecError::Io(_) | ExecError::Secret(_) => ResultErrorKind::ExecutionIoError,
            ExecError::Tunnel(t) => t.result_kind(),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tunnel_error_result_kinds() {
        assert_eq!(
            TunnelError::Auth("denied".into()).result_kind(),
            ResultErrorKind::TunnelAuthError
        );
        assert_eq!(
            TunnelError::Unreachable {
                dest: "10.0.0.5:22".into(),
                reason: "refused".into()
            }
            .result_kind(),
            ResultErrorKind::TunnelUnreachable
        );
        assert_eq!(
            TunnelError::Timeout {
                dest: "10.0.0.5:22".into(),
                timeout_secs: 20
            }
            .result_kind(),
            ResultErrorKind::TunnelTimeout
        );
    }

    #[test]
    fn test_exec_error_result_kinds() {
        assert_eq!(
            ExecError::Timeout { timeout_secs: 300 }.result_kind(),
            ResultErrorKind::ExecutionTimeout
        );
        assert_eq!(
            ExecError::Auth("bad password".into()).result_kind(),
            ResultErrorKind::ExecutionAuthError
        );
        // Tunnel failures keep their tunnel kind through the exec layer
        let err = ExecError::Tunnel(TunnelError::Auth("denied".into()));
        assert_eq!(err.result_kind(), ResultErrorKind::TunnelAuthError);
    }
}
