//! Process-level settings read from the environment before anything else starts.

use crate::config::paths::default_config_path;
use crate::config_sync::{CommandRestart, DEFAULT_MAX_ATTEMPTS, SyncSettings};
use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::env;
use std::panic::Location;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use const_format::concatcp;
use log::{debug, info, warn};

const ENV_PREFIX: &str = "RELAY_";

pub const CONFIG_PATH_VAR: &str = concatcp!(ENV_PREFIX, "CONFIG_PATH");
pub const SYNC_URL_VAR: &str = concatcp!(ENV_PREFIX, "SYNC_URL");
pub const SYNC_POLL_INTERVAL_MS_VAR: &str = concatcp!(ENV_PREFIX, "SYNC_POLL_INTERVAL_MS");
pub const SYNC_MAX_ATTEMPTS_VAR: &str = concatcp!(ENV_PREFIX, "SYNC_MAX_ATTEMPTS");
pub const SYNC_TIMEOUT_SECS_VAR: &str = concatcp!(ENV_PREFIX, "SYNC_TIMEOUT_SECS");
pub const SYNC_PERIOD_SECS_VAR: &str = concatcp!(ENV_PREFIX, "SYNC_PERIOD_SECS");
/// Program and arguments split on whitespace. Quoting is not supported; use a
/// wrapper script when an argument contains spaces.
pub const RESTART_COMMAND_VAR: &str = concatcp!(ENV_PREFIX, "RESTART_COMMAND");
pub const LOG_DIR_VAR: &str = concatcp!(ENV_PREFIX, "LOG_DIR");

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct BootstrapSettings {
    pub config_path: PathBuf,
    /// Reconciliation is skipped when unset.
    pub sync_url: Option<String>,
    pub sync_poll_interval: Duration,
    /// `None` means retry until an outcome is reached.
    pub sync_max_attempts: Option<u32>,
    /// Time limit for the first reconciliation.
    pub sync_timeout: Duration,
    pub sync_period: Option<Duration>,
    /// From [`RESTART_COMMAND_VAR`], split on whitespace without quote handling.
    pub restart_command: Option<CommandRestart>,
    pub log_dir: Option<PathBuf>,
}

impl BootstrapSettings {
    /// Load `.env` (if any) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        try_load_dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSetting`] for values that do not parse, and
    /// [`ConfigError::NoConfigDirectory`] when no config path can be determined.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let config_path = match read(CONFIG_PATH_VAR) {
            Some(path) => {
                info!("Using {CONFIG_PATH_VAR} override: {path}");
                PathBuf::from(path)
            }
            None => default_config_path()?,
        };

        let poll_interval_ms: u64 = parse_or(&read, SYNC_POLL_INTERVAL_MS_VAR, DEFAULT_POLL_INTERVAL_MS)?;
        let max_attempts: u32 = parse_or(&read, SYNC_MAX_ATTEMPTS_VAR, DEFAULT_MAX_ATTEMPTS)?;
        let timeout_secs: u64 = parse_or(&read, SYNC_TIMEOUT_SECS_VAR, DEFAULT_SYNC_TIMEOUT_SECS)?;
        let period_secs: Option<u64> = parse_optional(&read, SYNC_PERIOD_SECS_VAR)?;

        let restart_command = read(RESTART_COMMAND_VAR)
            .as_deref()
            .and_then(CommandRestart::from_command_line);

        let settings = Self {
            config_path,
            sync_url: read(SYNC_URL_VAR),
            sync_poll_interval: Duration::from_millis(poll_interval_ms),
            sync_max_attempts: (max_attempts > 0).then_some(max_attempts),
            sync_timeout: Duration::from_secs(timeout_secs),
            sync_period: period_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            restart_command,
            log_dir: read(LOG_DIR_VAR).map(PathBuf::from),
        };

        debug!("Bootstrap settings: {settings:?}");
        Ok(settings)
    }

    /// Reconciliation settings, if a sync URL is configured.
    pub fn sync_settings(&self) -> Option<SyncSettings> {
        let endpoint = self.sync_url.as_ref()?;

        Some(
            SyncSettings::new(endpoint.clone(), self.config_path.clone())
                .with_poll_interval(self.sync_poll_interval)
                .with_max_attempts(self.sync_max_attempts),
        )
    }
}

fn parse_optional<T, F>(read: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    read(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidSetting {
                location: ErrorLocation::from(Location::caller()),
                variable: name,
                value: raw.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_or<T, F>(read: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_optional(read, name)?.unwrap_or(default))
}

/// Load `.env` from the working directory, then from next to the executable.
fn try_load_dotenv() -> bool {
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded .env from: {path:?}");
        return true;
    }

    if let Ok(exe_path) = env::current_exe()
        && let Some(exe_dir) = exe_path.parent()
    {
        let env_path = exe_dir.join(".env");
        if env_path.exists() {
            match dotenvy::from_path(&env_path) {
                Ok(()) => {
                    info!("Loaded .env from: {env_path:?}");
                    return true;
                }
                Err(e) => warn!("Failed to parse .env at {env_path:?}: {e}"),
            }
        }
    }

    debug!("No .env file found");
    false
}
