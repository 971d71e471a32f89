//! Ingestion connection manager.
//!
//! Keeps one long-lived WebSocket open per account, answers heartbeats, drops control
//! frames and hands every application frame to a [`FrameHandler`]. Connection loss
//! always leads to a fixed-delay reconnect; only [`IngestHandle::stop`] ends the loop.
//!
//! Frames sent by the server while no socket is open are lost. There is no replay or
//! buffering across reconnects.

mod client;
pub mod frame;
mod handle;
mod handler;
pub mod lifecycle;
mod settings;

pub use client::start;
pub use frame::{FrameDisposition, classify, classify_text, heartbeat_message};
pub use handle::IngestHandle;
pub use handler::FrameHandler;
pub use lifecycle::{ArmedTimer, Lifecycle, LifecycleEvent, Transition};
pub use settings::{
    ACCESS_TOKEN_PARAM, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HEARTBEAT_INTERVAL,
    DEFAULT_PATH_SUFFIX, DEFAULT_RECONNECT_DELAY, IngestSettings,
};
