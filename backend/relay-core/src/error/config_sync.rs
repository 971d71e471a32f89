//! Error types for configuration reconciliation.
//!
//! - Transport, status and protocol errors are retried by the loop
//! - Resource errors (local write failures) end the loop and reach the caller
//! - HTTP status codes are stored directly, never parsed back out of messages

use common::{ErrorLocation, HttpStatusCode};

use std::panic::Location;
use std::path::PathBuf;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SyncError {
    #[error("Config endpoint unreachable: {message} {location}")]
    Transport {
        message: String,
        is_timeout: bool,
        is_connection: bool,
        location: ErrorLocation,
    },

    #[error("Config endpoint returned HTTP {status_code}: {message} {location}")]
    Status {
        status_code: HttpStatusCode,
        message: String,
        location: ErrorLocation,
    },

    #[error("Config payload rejected: {message} {location}")]
    Protocol {
        message: String,
        location: ErrorLocation,
    },

    #[error("Config file write failed: {path}: {source} {location}")]
    Resource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Machine identity unavailable: {message} {location}")]
    Identity {
        message: String,
        location: ErrorLocation,
    },

    #[error("Restart command failed: {message} {location}")]
    Restart {
        message: String,
        location: ErrorLocation,
    },
}

impl SyncError {
    #[track_caller]
    pub fn protocol(message: impl Into<String>) -> Self {
        SyncError::Protocol {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn resource(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Resource {
            path: path.into(),
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn identity(message: impl Into<String>) -> Self {
        SyncError::Identity {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn restart(message: impl Into<String>) -> Self {
        SyncError::Restart {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Create from reqwest error with proper categorization.
    #[track_caller]
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return SyncError::Status {
                status_code: HttpStatusCode(status.as_u16()),
                message: error.to_string(),
                location: ErrorLocation::from(Location::caller()),
            };
        }

        if error.is_decode() {
            return SyncError::Protocol {
                message: format!("Response body is not valid JSON: {error}"),
                location: ErrorLocation::from(Location::caller()),
            };
        }

        SyncError::Transport {
            message: error.to_string(),
            is_timeout: error.is_timeout(),
            is_connection: error.is_connect(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Create from an HTTP response with a non-success status.
    #[track_caller]
    pub fn from_http_response(status_code: u16, body: impl Into<String>) -> Self {
        SyncError::Status {
            status_code: HttpStatusCode(status_code),
            message: body.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Whether the reconciliation loop should sleep and try again.
    ///
    /// Every network and payload problem retries; only local resource failures, a missing
    /// identity and restart failures are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { .. } => true,
            SyncError::Status { .. } => true,
            SyncError::Protocol { .. } => true,
            SyncError::Resource { .. } => false,
            SyncError::Identity { .. } => false,
            SyncError::Restart { .. } => false,
        }
    }

    /// Short category for log lines.
    pub fn error_category(&self) -> &'static str {
        match self {
            SyncError::Transport { is_timeout: true, .. } => "timeout",
            SyncError::Transport { is_connection: true, .. } => "connection",
            SyncError::Transport { .. } => "transport",
            SyncError::Status { status_code, .. } if status_code.is_transient() => "transient",
            SyncError::Status { status_code, .. } if status_code.is_client_error() => "client_error",
            SyncError::Status { status_code, .. } if status_code.is_server_error() => "server_error",
            SyncError::Status { .. } => "status",
            SyncError::Protocol { .. } => "protocol",
            SyncError::Resource { .. } => "resource",
            SyncError::Identity { .. } => "identity",
            SyncError::Restart { .. } => "restart",
        }
    }

    /// HTTP status code, if this error carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SyncError::Status { status_code, .. } => Some(status_code.0),
            _ => None,
        }
    }
}
