//! Process logging: colored stdout plus an optional plain-text file.
//!
//! Initialization runs once; later calls log a warning and succeed.

use crate::error::RelayError;

use std::fs::File;
use std::io::stdout;
use std::path::Path;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use fern::Dispatch;
use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use humantime::format_rfc3339;
use log::{LevelFilter, info, warn};

static INIT_LOGGER_ONCE: Once = Once::new();

static LOGGER_ALREADY_CALLED: AtomicBool = AtomicBool::new(false);

pub const LOG_FILE_NAME: &str = "relay.log";

#[cfg(debug_assertions)]
const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

#[cfg(not(debug_assertions))]
const LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Chatty dependencies are capped at `Info` even in debug builds.
const QUIET_MODULES: [&str; 4] = ["tungstenite", "tokio_tungstenite", "reqwest", "hyper_util"];

/// Initialize the global logger.
///
/// Writes colored lines to stdout and, when `log_dir` is given, plain lines to
/// [`LOG_FILE_NAME`] inside it. Safe to call more than once.
///
/// # Errors
///
/// Returns [`RelayError::Relay`] if the log file cannot be opened or another logger
/// was installed outside this function.
pub fn initialize(log_dir: Option<&Path>) -> Result<(), RelayError> {
    if LOGGER_ALREADY_CALLED.swap(true, Ordering::SeqCst) {
        warn!("Logger already initialized");
        return Ok(());
    }

    let mut result = Ok(());

    INIT_LOGGER_ONCE.call_once(|| {
        result = initialize_internal(log_dir);
        if result.is_ok() {
            info!("Logger initialized with level: {LOG_LEVEL:?}");
            if let Some(dir) = log_dir {
                info!("Log file: {}", dir.join(LOG_FILE_NAME).display());
            }
        }
    });

    result
}

fn initialize_internal(log_dir: Option<&Path>) -> Result<(), RelayError> {
    let colors = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    let mut base_dispatch = Dispatch::new().level(LOG_LEVEL);
    for module in QUIET_MODULES {
        base_dispatch = base_dispatch.level_for(module, LevelFilter::Info.min(LOG_LEVEL));
    }

    let stdout_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{date} - {level}] {message} [{file}:{line}]",
                date = format_rfc3339(SystemTime::now()),
                level = colors.color(record.level()),
                file = record.file().unwrap_or("unknown"),
                line = record.line().unwrap_or(0),
            ))
        })
        .chain(stdout());

    base_dispatch = base_dispatch.chain(stdout_dispatch);

    if let Some(dir) = log_dir {
        let log_file = open_log_file(dir)?;

        let file_dispatch = Dispatch::new()
            .format(move |out, message, record| {
                out.finish(format_args!(
                    "[{date} - {level}] {message} [{file}:{line}]",
                    date = format_rfc3339(SystemTime::now()),
                    level = record.level(),
                    file = record.file().unwrap_or("unknown"),
                    line = record.line().unwrap_or(0),
                ))
            })
            .chain(log_file);

        base_dispatch = base_dispatch.chain(file_dispatch);
    }

    base_dispatch
        .apply()
        .map_err(|e| RelayError::relay(format!("Failed to initialize logger: {e}")))
}

/// Open (or create) the log file in append mode.
pub(crate) fn open_log_file(dir: &Path) -> Result<File, RelayError> {
    let log_file_path = dir.join(LOG_FILE_NAME);
    fern::log_file(&log_file_path).map_err(|e| {
        RelayError::relay(format!(
            "Failed to create log file {}: {e}",
            log_file_path.display()
        ))
    })
}
