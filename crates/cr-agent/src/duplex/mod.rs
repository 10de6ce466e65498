//! Duplex transport client
//!
//! Maintains the persistent connection to the controller: register with
//! the stable identity as the first frame, execute pushed commands one
//! at a time, answer heartbeats, and reconnect with exponential backoff
//! when the connection drops.

mod connector;
mod reconnect;

pub use connector::DuplexClient;
pub use reconnect::ExponentialBackoff;
