//! Resilience layer of the chat relay.
//!
//! - [`ingest`]: long-lived WebSocket connection per account with heartbeats and reconnect
//! - [`config_sync`]: startup reconciliation of the local config file with the control endpoint
//! - [`config`]: the account configuration file and bootstrap environment settings
//! - [`outbound`]: text replies back to the chat platform

pub mod config;
pub mod config_sync;
pub mod error;
pub mod ingest;
pub mod outbound;

#[cfg(test)]
mod tests;

pub use error::CoreError;
