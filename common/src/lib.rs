//! Shared building blocks for the relay workspace.
//!
//! Everything here is dependency-light and used by every other crate:
//!
//! - [`ErrorLocation`]: call-site capture attached to every error variant
//! - [`HttpStatusCode`]: status classification for retry decisions
//! - [`RedactedToken`]: credentials that never reach logs or serialized output

pub mod error;
pub mod http_status;
pub mod redacted_token;


pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use http_status::HttpStatusCode;
pub use redacted_token::RedactedToken;
