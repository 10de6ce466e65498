//! Message types for the c-Relay duplex protocol
//!
//! High-level messages exchanged between agents and the controller over
//! the persistent connection. Messages are serialized into frames using
//! the codec defined in `codec.rs`.
//!
//! # Message Flow
//!
//! 1. Agent connects and sends `Register` as its very first frame
//! 2. Controller responds with `RegisterAck`
//! 3. Controller sends `Heartbeat` periodically, agent responds with
//!    `HeartbeatAck` (detects half-open connections)
//! 4. Controller pushes `Command` frames as tasks are enqueued; the frame
//!    header carries the correlation id
//! 5. Agent executes and answers with a `TaskResult` frame under the same
//!    correlation id

use serde::{Deserialize, Serialize};

use crate::task::{TaskKind, TaskResult};

/// Current protocol version string.
///
/// Included in Register messages; format "MAJOR.MINOR" where MAJOR
/// changes indicate breaking changes.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Message type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Registration message (agent -> controller, first frame)
    Register = 0x01,
    /// Registration acknowledgment
    RegisterAck = 0x02,
    /// Task pushed to the agent
    Command = 0x03,
    /// Execution result for a command
    TaskResult = 0x04,
    /// Heartbeat ping (controller -> agent)
    Heartbeat = 0x05,
    /// Heartbeat acknowledgment (agent -> controller)
    HeartbeatAck = 0x06,
    /// Error response
    Error = 0xFF,
}

impl MessageType {
    /// Convert to u8
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Register),
            0x02 => Some(Self::RegisterAck),
            0x03 => Some(Self::Command),
            0x04 => Some(Self::TaskResult),
            0x05 => Some(Self::Heartbeat),
            0x06 => Some(Self::HeartbeatAck),
            0xFF => Some(Self::Error),
            _ => None,
        }
    }
}

/// Error codes for error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    /// Unknown error
    Unknown = 0,
    /// Registration rejected
    RegistrationRejected = 1,
    /// Frame arrived before registration
    NotRegistered = 2,
    /// Malformed or unexpected message
    InvalidMessage = 3,
}

/// Protocol messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    /// Agent registration.
    ///
    /// Sent by the agent immediately after connecting to identify itself.
    /// The identity is stable across restarts (persisted per machine) so
    /// queued tasks keep their affinity over reconnects.
    Register {
        /// Stable agent identity
        agent_id: String,
        /// Hostname of the agent machine
        hostname: String,
        /// Operating system (e.g., "linux", "macos", "windows")
        os: String,
        /// CPU architecture (e.g., "x86_64", "aarch64")
        arch: String,
        /// Protocol version (e.g., "1.0"). Optional for backward
        /// compatibility; use `PROTOCOL_VERSION` when sending.
        #[serde(default)]
        version: Option<String>,
    },

    /// Registration acknowledgment
    RegisterAck {
        /// Whether registration was accepted
        accepted: bool,
        /// Reason if not accepted
        reason: Option<String>,
    },

    /// Task pushed to the agent; the frame header carries the
    /// correlation id
    Command {
        /// What to execute
        kind: TaskKind,
    },

    /// Execution result; the frame header carries the correlation id
    TaskResult(TaskResult),

    /// Heartbeat ping
    Heartbeat {
        /// Timestamp for latency measurement
        timestamp: u64,
    },

    /// Heartbeat acknowledgment
    HeartbeatAck {
        /// Echo of the original timestamp
        timestamp: u64,
    },

    /// Error response
    Error {
        /// Error code
        code: ErrorCode,
        /// Human-readable message
        message: String,
    },
}

impl Message {
    /// Get the message type for this message
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Register { .. } => MessageType::Register,
            Message::RegisterAck { .. } => MessageType::RegisterAck,
            Message::Command { .. } => MessageType::Command,
            Message::TaskResult(_) => MessageType::TaskResult,
            Message::Heartbeat { .. } => MessageType::Heartbeat,
            Message::HeartbeatAck { .. } => MessageType::HeartbeatAck,
            Message::Error { .. } => MessageType::Error,
        }
    }

    /// Short name for state-machine errors and logging
    pub fn name(&self) -> &'static str {
        match self {
            Message::Register { .. } => "Register",
            Message::RegisterAck { .. } => "RegisterAck",
            Message::Command { .. } => "Command",
            Message::TaskResult(_) => "TaskResult",
            Message::Heartbeat { .. } => "Heartbeat",
            Message::HeartbeatAck { .. } => "HeartbeatAck",
            Message::Error { .. } => "Error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_roundtrip() {
        for msg_type in [
            MessageType::Register,
            MessageType::RegisterAck,
            MessageType::Command,
            MessageType::TaskResult,
            MessageType::Heartbeat,
            MessageType::HeartbeatAck,
            MessageType::Error,
        ] {
            let byte = msg_type.as_u8();
            let recovered = MessageType::from_u8(byte).unwrap();
            assert_eq!(recovered, msg_type);
        }
    }

    #[test]
    fn test_unknown_type_byte() {
        assert!(MessageType::from_u8(0x42).is_none());
    }

    #[test]
    fn test_message_type_matches_variant() {
        let msg = Message::Heartbeat { timestamp: 1 };
        assert_eq!(msg.message_type(), MessageType::Heartbeat);
        assert_eq!(msg.name(), "Heartbeat");
    }
}
