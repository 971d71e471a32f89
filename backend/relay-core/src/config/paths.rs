//! Default location of the relay configuration file.
//!
//! Lookup order:
//! 1. Explicit override (`RELAY_CONFIG_PATH`, resolved by the caller)
//! 2. Platform config directory via `dirs` (`~/.config/relay/config.json` on Linux)
//! 3. `$HOME/.config/relay/config.json`

use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::env;
use std::panic::Location;
use std::path::PathBuf;

use log::{debug, warn};

pub const APP_DIR_NAME: &str = "relay";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Platform default path of the configuration file.
///
/// # Errors
///
/// Returns [`ConfigError::NoConfigDirectory`] if neither a platform config directory
/// nor `HOME` is available.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME);
        debug!("Platform config path: {}", path.display());
        return Ok(path);
    }

    if let Ok(home) = env::var("HOME") {
        let path = PathBuf::from(home)
            .join(".config")
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME);
        warn!("Using HOME fallback config path: {}", path.display());
        return Ok(path);
    }

    Err(ConfigError::NoConfigDirectory {
        location: ErrorLocation::from(Location::caller()),
        reason: String::from(
            "Cannot determine config directory. Set RELAY_CONFIG_PATH environment variable.",
        ),
    })
}
