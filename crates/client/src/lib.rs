//! wsprobe client - manual test harness for the exchange messaging endpoint.
//!
//! Provisions a session over REST, opens the broker websocket under it,
//! routes broadcast and private messages to a status reporter, and can fire
//! the privileged start signal.

pub mod config;
pub mod logging;
pub mod provision;
pub mod router;
pub mod status;
pub mod storage;
pub mod ws;

pub use config::{ConfigRecord, ConfigStore};
pub use provision::{SessionProvisioner, SessionToken};
pub use router::SubscriptionRouter;
pub use status::{StatusKind, StatusReporter};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use ws::{ConnectSettings, ConnectionManager, ConnectionState};
