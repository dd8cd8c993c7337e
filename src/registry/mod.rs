//! Live connection management
//!
//! This module owns the map of connected callers:
//! - Connect with replace-on-reconnect (the old socket gets a close signal)
//! - Best-effort unicast and snapshot broadcast
//! - Heartbeat bookkeeping and the periodic stale-connection sweep
//! - The per-connection buffer of not-yet-extracted transcript chunks

mod connection;
mod registry;

pub use connection::{ConnectionHandle, Outbound};
pub use registry::{spawn_sweep, ConnectionRegistry};
