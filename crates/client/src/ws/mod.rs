//! Live broker connection: state machine, lifecycle, frame pump.

mod connection;
mod manager;

pub use manager::{build_ws_url, ConnectionManager};

use std::time::Duration;

/// Connection lifecycle states. `Errored` is transient: the manager schedules
/// an automatic reconnect out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, ConnectionState::Disconnected)
    }
}

/// Tunables for the connection loop. The defaults mirror the reference tool:
/// fixed 5 s reconnect delay, unbounded retries, symmetric 4 s heartbeats.
#[derive(Debug, Clone)]
pub struct ConnectSettings {
    pub reconnect_delay: Duration,
    pub heartbeat: Duration,
}

impl Default for ConnectSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(5000),
            heartbeat: Duration::from_millis(4000),
        }
    }
}
