pub mod bootstrap;
pub mod paths;

pub use bootstrap::BootstrapSettings;

use crate::config_sync::store;
use crate::error::SyncError;
use crate::error::config::ConfigError;
use crate::ingest::IngestSettings;

use common::{ErrorLocation, RedactedToken};

use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

// ============================================
// CONFIG STRUCTS
// ============================================

/// One chat-platform account the relay ingests for.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub ws_url: String,

    #[serde(default)]
    pub access_token: String,

    #[serde(default)]
    pub app_id: String,

    #[serde(default)]
    pub agent_id: String,

    #[serde(default)]
    pub send_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_suffix: Option<String>,
}

// Hand-written so the token never reaches a log line.
impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("enabled", &self.enabled)
            .field("ws_url", &self.ws_url)
            .field("access_token", &"[REDACTED]")
            .field("app_id", &self.app_id)
            .field("agent_id", &self.agent_id)
            .field("send_url", &self.send_url)
            .field("path_suffix", &self.path_suffix)
            .finish()
    }
}

/// The reconciled configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,
}

/// On-disk shape before per-account checks.
#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    accounts: BTreeMap<String, serde_json::Value>,
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_enabled() -> bool {
    true
}

// ============================================
// IMPLEMENTATION
// ============================================

impl AccountConfig {
    pub fn token(&self) -> RedactedToken {
        RedactedToken::new(self.access_token.clone())
    }

    /// Connection settings for this account with default timings.
    pub fn ingest_settings(&self, account: &str) -> IngestSettings {
        let settings = IngestSettings::new(account, self.ws_url.clone(), self.token());

        match &self.path_suffix {
            Some(suffix) => settings.with_path_suffix(suffix.clone()),
            None => settings,
        }
    }

    fn validate(&self, account: &str) -> Result<(), ConfigError> {
        if !self.ws_url.starts_with("ws://") && !self.ws_url.starts_with("wss://") {
            return Err(ConfigError::InvalidAccount {
                location: ErrorLocation::from(Location::caller()),
                account: account.to_string(),
                reason: format!("wsUrl '{}' is not a ws:// or wss:// URL", self.ws_url),
            });
        }

        if self.access_token.trim().is_empty() {
            return Err(ConfigError::InvalidAccount {
                location: ErrorLocation::from(Location::caller()),
                account: account.to_string(),
                reason: String::from("accessToken cannot be empty"),
            });
        }

        if !self.send_url.is_empty()
            && !self.send_url.starts_with("http://")
            && !self.send_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidAccount {
                location: ErrorLocation::from(Location::caller()),
                account: account.to_string(),
                reason: format!("sendUrl '{}' is not an http:// or https:// URL", self.send_url),
            });
        }

        Ok(())
    }
}

impl RelayConfig {
    /// Load the configuration file.
    ///
    /// Accounts are checked one at a time: an entry that does not deserialize, or an
    /// enabled entry that fails [`AccountConfig`] validation, is logged and skipped so
    /// the remaining accounts still start.
    ///
    /// # Returns
    ///
    /// Returns defaults (no accounts) if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read, or is not a JSON
    /// object with an `accounts` map.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("Config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            warn!("Failed to read config file: {e}");
            ConfigError::Read {
                location: ErrorLocation::from(Location::caller()),
                path: path.to_path_buf(),
                source: e,
            }
        })?;

        let document: RawDocument = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {e}");
            ConfigError::Parse {
                location: ErrorLocation::from(Location::caller()),
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        let total = document.accounts.len();
        let mut config = RelayConfig::default();

        for (id, raw) in document.accounts {
            let account: AccountConfig = match serde_json::from_value(raw) {
                Ok(account) => account,
                Err(e) => {
                    warn!("Skipping account '{id}': {e}");
                    continue;
                }
            };

            if account.enabled
                && let Err(e) = account.validate(&id)
            {
                warn!("Skipping account: {e}");
                continue;
            }

            config.accounts.insert(id, account);
        }

        info!(
            "Config loaded from {} ({} of {} accounts usable)",
            path.display(),
            config.accounts.len(),
            total
        );
        Ok(config)
    }

    /// Save through the same atomic replace the reconciliation loop uses.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation, serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        let value = serde_json::to_value(self).map_err(|e| ConfigError::Serialize {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        store::replace_atomically(path, &value).map_err(|e| match e {
            SyncError::Resource { path, source, .. } => ConfigError::Write {
                location: ErrorLocation::from(Location::caller()),
                path,
                source,
            },
            other => ConfigError::Serialize {
                location: ErrorLocation::from(Location::caller()),
                reason: other.to_string(),
            },
        })?;

        info!("Config saved to {}", path.display());
        Ok(())
    }

    /// Validate every enabled account. Disabled accounts may be incomplete.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAccount`] naming the first bad account.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (id, account) in self.enabled_accounts() {
            account.validate(id)?;
        }
        Ok(())
    }

    pub fn enabled_accounts(&self) -> impl Iterator<Item = (&str, &AccountConfig)> {
        self.accounts
            .iter()
            .filter(|(_, account)| account.enabled)
            .map(|(id, account)| (id.as_str(), account))
    }
}
