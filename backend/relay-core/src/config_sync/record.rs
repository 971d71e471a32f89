use crate::config_sync::canonical::content_digest;
use crate::error::SyncError;

use log::warn;
use serde_json::Value;

/// Local and remote configuration side by side, with their content digests.
///
/// Rebuilt on every poll attempt and never persisted.
#[derive(Debug, Clone)]
pub struct ReconciliationRecord {
    pub local_config: Option<Value>,
    pub remote_config: Value,
    pub local_hash: String,
    pub remote_hash: String,
}

impl ReconciliationRecord {
    /// Hash both sides.
    ///
    /// A local document that cannot be canonicalized hashes as absent, which forces an
    /// update. A remote document that cannot be canonicalized is a protocol error.
    pub fn new(local_config: Option<Value>, remote_config: Value) -> Result<Self, SyncError> {
        let remote_hash = content_digest(&remote_config)?;

        let local_hash = match local_config.as_ref().map(content_digest) {
            Some(Ok(hash)) => hash,
            Some(Err(e)) => {
                warn!("[config-sync] Local configuration cannot be hashed: {e}");
                String::new()
            }
            None => String::new(),
        };

        Ok(Self {
            local_config,
            remote_config,
            local_hash,
            remote_hash,
        })
    }

    pub fn is_current(&self) -> bool {
        !self.local_hash.is_empty() && self.local_hash == self.remote_hash
    }
}
