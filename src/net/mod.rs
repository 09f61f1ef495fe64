//! Network-level bookkeeping shared by managed servers.

pub mod connection;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
