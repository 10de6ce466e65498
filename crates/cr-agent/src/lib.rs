//! cr-agent: Client agent for c-Relay
//!
//! Runs near a private network, maintains a connection to the controller
//! (persistent duplex, or the deprecated HTTP polling fallback), executes
//! relayed tasks locally or over SSH, and reports correlated results.

pub mod duplex;
pub mod exec;
pub mod poll;
pub mod secrets;
mod ssh;
pub mod tunnel;
