use common::ErrorLocation;

use relay_core::error::{ConfigError, IngestError, SyncError};

use thiserror::Error;

/// Errors that end the relay process.
///
/// Library errors pass through unchanged; `Relay` covers failures of the process
/// shell itself (logger, signal handling).
#[derive(Debug, Error)]
pub enum RelayError {
    /// Error from this app
    #[error("Relay Error: {message} {location}")]
    Relay {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl RelayError {
    #[track_caller]
    pub fn relay(message: impl Into<String>) -> Self {
        RelayError::Relay {
            message: message.into(),
            location: ErrorLocation::from(std::panic::Location::caller()),
        }
    }
}
