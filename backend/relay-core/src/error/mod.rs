pub mod config;
pub mod config_sync;
pub mod ingest;
pub mod outbound;

pub use config::ConfigError;
pub use config_sync::SyncError;
pub use ingest::IngestError;
pub use outbound::OutboundError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Outbound(#[from] OutboundError),
}
