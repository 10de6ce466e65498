//! Correlation identifier type

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque token linking an enqueued task to its eventual result.
///
/// Correlation ids are generated by the controller at enqueue time and
/// travel in the frame header on the duplex wire, so every command and
/// result frame is routable without inspecting the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    /// Generate a fresh correlation id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Correlation id used by control frames not bound to a task
    /// (Register, RegisterAck, Heartbeat, HeartbeatAck, Error).
    pub const CONTROL: CorrelationId = CorrelationId(Uuid::nil());

    /// Whether this is the control id
    pub fn is_control(&self) -> bool {
        self.0.is_nil()
    }

    /// Raw big-endian bytes for frame encoding
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Reconstruct from frame bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Parse from a string form (HTTP path segments)
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}
