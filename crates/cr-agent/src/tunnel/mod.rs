//! Tunnel broker
//!
//! Forwards connections through a reachable jump host to destinations
//! the agent cannot reach directly. Each open session binds an ephemeral
//! local listener; connecting to it lands on `dest_host:dest_port` as if
//! it were locally reachable.

mod broker;
mod relay;

pub use broker::{run_reaper, TunnelBroker, TunnelHandle};
