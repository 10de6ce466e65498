//! cr-protocol: Wire protocol for the c-Relay duplex transport
//!
//! This crate defines the binary protocol spoken between the controller
//! and client agents over the persistent duplex connection, plus the
//! task/result schema shared with the HTTP polling transport.

pub mod correlation;
pub mod error;
pub mod frame;
pub mod message;
pub mod codec;
pub mod task;

pub use correlation::CorrelationId;
pub use error::ProtocolError;
pub use frame::{FrameHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use message::{ErrorCode, Message, MessageType, PROTOCOL_VERSION};
pub use codec::{Frame, FrameCodec};
pub use task::{
    AuthMethod, JumpHost, RemoteTarget, ResultErrorKind, SecretRef, TaskKind, TaskResult,
    DEFAULT_SSH_PORT,
};
