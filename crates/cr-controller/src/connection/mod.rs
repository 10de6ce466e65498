//! Duplex connection tracking

mod pool;

pub use pool::{ConnectionPool, DuplexConnection};
