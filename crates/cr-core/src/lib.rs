//! cr-core: Core types and configuration for c-Relay
//!
//! This crate provides shared domain types, error hierarchy, configuration
//! structures, and the persisted agent identity used by the controller,
//! agent, and CLI components.

pub mod config;
pub mod error;
pub mod identity;
pub mod time;
pub mod traits;
pub mod types;

pub use error::RelayError;
pub use types::{AgentId, AgentInfo, AgentState, TaskSpec, TransportKind};
