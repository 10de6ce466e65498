//! cr-cli: Command-line interface for c-Relay
//!
//! Provides the `c-relay` CLI for enqueueing tasks against the
//! controller's HTTP API and inspecting agents and results.

pub mod client;
pub mod commands;
pub mod output;
