use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Raised when a secret is about to leave the process through a generic path.
#[derive(Debug, ThisError)]
pub enum RedactError {
    #[error("Secret Exposure Refused: {kind} must be read through expose() {location}")]
    ImplicitExposure {
        kind: &'static str,
        location: ErrorLocation,
    },
}
