//! Outward-facing status interface.
//!
//! The core never touches the UI directly; everything an operator sees goes
//! through this trait. The interactive front end installs a printing
//! implementation, tests install a recording one.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Ok,
    Error,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKind::Info => write!(f, "info"),
            StatusKind::Ok => write!(f, "ok"),
            StatusKind::Error => write!(f, "error"),
        }
    }
}

pub trait StatusReporter: Send + Sync {
    /// Human-readable status line (connection lifecycle, errors).
    fn on_status(&self, text: &str, kind: StatusKind);

    /// A displayable inbound or outbound event.
    fn on_message(&self, text: &str);

    /// Connected-ness changed; the UI enables/disables affordances on this.
    fn on_connected_change(&self, connected: bool);
}

/// Reporter used by the interactive front end: prints to stdout and mirrors
/// into tracing.
pub struct LogReporter;

impl StatusReporter for LogReporter {
    fn on_status(&self, text: &str, kind: StatusKind) {
        match kind {
            StatusKind::Error => tracing::error!("{text}"),
            _ => tracing::info!("{text}"),
        }
        println!("[{kind}] {text}");
    }

    fn on_message(&self, text: &str) {
        println!("  {text}");
    }

    fn on_connected_change(&self, connected: bool) {
        tracing::debug!("connected = {connected}");
    }
}
