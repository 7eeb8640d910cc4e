//! Shared protocol and error types for the wsprobe harness.

pub mod error;
pub mod frame;

pub use error::*;
pub use frame::*;
