//! Local configuration file access.
//!
//! Reads are tolerant: a missing or corrupt file means "no local configuration".
//! Writes are atomic: content goes to a sibling temp file which is then renamed over
//! the target, so readers see either the old document or the new one.

use crate::error::SyncError;

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde_json::Value;
use uuid::Uuid;

/// Read and parse the local configuration, treating any failure as absence.
pub fn read_local(path: &Path) -> Option<Value> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("[config-sync] No local configuration at {}", path.display());
            return None;
        }
        Err(e) => {
            warn!(
                "[config-sync] Failed to read {}, treating as absent: {}",
                path.display(),
                e
            );
            return None;
        }
    };

    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                "[config-sync] Local configuration at {} is not valid JSON, treating as absent: {}",
                path.display(),
                e
            );
            None
        }
    }
}

/// Sibling temp path for `target`, unique per call so concurrent writers never share one.
pub fn temp_path_for(target: &Path) -> PathBuf {
    let file_name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("config.json"));

    target.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()))
}

/// First half of an atomic replace: write `value` to a fresh sibling temp file.
///
/// The target is not touched. Returns the temp path for [`commit`].
pub fn write_temp(target: &Path, value: &Value) -> Result<PathBuf, SyncError> {
    if let Some(dir) = target.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| SyncError::resource(dir, e))?;
    }

    let json = serde_json::to_string_pretty(value)
        .map_err(|e| SyncError::protocol(format!("Failed to serialize configuration: {e}")))?;

    let temp_path = temp_path_for(target);

    let write_result = File::create(&temp_path).and_then(|mut file| {
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()
    });

    if let Err(e) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(SyncError::resource(&temp_path, e));
    }

    debug!("[config-sync] Wrote {}", temp_path.display());
    Ok(temp_path)
}

/// Second half of an atomic replace: rename the temp file over the target.
pub fn commit(temp_path: &Path, target: &Path) -> Result<(), SyncError> {
    // POSIX rename replaces the target atomically.
    fs::rename(temp_path, target).map_err(|e| {
        let _ = fs::remove_file(temp_path);
        SyncError::resource(target, e)
    })
}

/// Replace `target` with `value` in full, never leaving a partial file behind.
pub fn replace_atomically(target: &Path, value: &Value) -> Result<(), SyncError> {
    let temp_path = write_temp(target, value)?;
    commit(&temp_path, target)?;

    info!("[config-sync] Configuration written to {}", target.display());
    Ok(())
}
