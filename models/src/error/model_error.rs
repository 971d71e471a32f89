use crate::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ModelError {
    /// Inbound payload that cannot be an application frame.
    #[error("Frame Error: {message} {location}")]
    Frame {
        message: String,
        location: ErrorLocation,
    },

    /// Missing, blank or malformed machine identity field.
    #[error("Identity Error: {field}: {message} {location}")]
    Identity {
        field: &'static str,
        message: String,
        location: ErrorLocation,
    },
}
