use std::path::PathBuf;

use common::ErrorLocation;
use thiserror::Error;

/// Errors from the local configuration file and the bootstrap environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config Read Error: {path}: {source} {location}")]
    Read {
        location: ErrorLocation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config Parse Error: {path}: {reason} {location}")]
    Parse {
        location: ErrorLocation,
        path: PathBuf,
        reason: String,
    },

    #[error("Config Write Error: {path}: {source} {location}")]
    Write {
        location: ErrorLocation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config Serialization Error: {reason} {location}")]
    Serialize {
        location: ErrorLocation,
        reason: String,
    },

    /// No platform config directory and no override.
    #[error("Config Location Error: {reason} {location}")]
    NoConfigDirectory {
        location: ErrorLocation,
        reason: String,
    },

    /// An enabled account that cannot be connected.
    #[error("Invalid Account '{account}': {reason} {location}")]
    InvalidAccount {
        location: ErrorLocation,
        account: String,
        reason: String,
    },

    /// A bootstrap environment variable that does not parse.
    #[error("Invalid Setting {variable}='{value}': {reason} {location}")]
    InvalidSetting {
        location: ErrorLocation,
        variable: &'static str,
        value: String,
        reason: String,
    },
}
