//! Configuration reconciliation against the remote control endpoint.
//!
//! # Flow
//! 1. Read the local configuration once (absent or corrupt counts as "none")
//! 2. Up to `max_attempts` times: fetch the remote configuration for this machine
//! 3. Canonicalize and hash both sides; equal hashes end the loop as `UpToDate`
//! 4. Otherwise replace the local file atomically, fire the restart hook, end as `Updated`
//! 5. If every attempt failed, end as `ExhaustedRetries` and leave the file alone
//!
//! Network, HTTP and payload errors all take the same sleep-and-retry path. Only a
//! failed local write is returned as an error.

pub mod canonical;
pub mod identity;
pub mod record;
pub mod remote;
pub mod restart;
pub mod store;

pub use identity::machine_identity;
pub use record::ReconciliationRecord;
pub use remote::ConfigClient;
pub use restart::{CommandRestart, RestartHook};

use crate::error::SyncError;

use models::{MachineIdentity, SyncOutcome};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::sleep as TokioSleep;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Settings for one reconciliation run.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Base URL; the encoded identity is appended verbatim.
    pub endpoint: String,
    /// The configuration file to keep in sync.
    pub local_path: PathBuf,
    /// Wait between failed attempts.
    pub poll_interval: Duration,
    /// `None` retries until an outcome is reached.
    pub max_attempts: Option<u32>,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl SyncSettings {
    pub fn new(endpoint: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: endpoint.into(),
            local_path: local_path.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            request_timeout: remote::DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

/// Run the reconciliation loop to completion.
///
/// # Returns
///
/// * `Ok(SyncOutcome::UpToDate)` - local and remote hash the same, nothing written
/// * `Ok(SyncOutcome::Updated)` - local file replaced (restart hook already invoked)
/// * `Ok(SyncOutcome::ExhaustedRetries)` - no attempt succeeded, local file untouched.
///   `max_attempts: Some(0)` lands here without contacting the endpoint.
///
/// # Errors
///
/// Returns [`SyncError::Resource`] if the local file could not be replaced.
pub async fn reconcile(
    settings: &SyncSettings,
    identity: &MachineIdentity,
    restart: Option<&dyn RestartHook>,
) -> Result<SyncOutcome, SyncError> {
    if settings.max_attempts == Some(0) {
        warn!("[config-sync] max attempts is 0, skipping reconciliation");
        return Ok(SyncOutcome::ExhaustedRetries);
    }

    let client = ConfigClient::new(settings.endpoint.clone(), settings.request_timeout)?;
    let local_config = store::read_local(&settings.local_path);
    let mut poll_delay = Constant::new(settings.poll_interval);
    let mut attempt: u32 = 0;

    info!(
        "[config-sync] Reconciling {} against {} (max attempts: {})",
        settings.local_path.display(),
        settings.endpoint,
        settings
            .max_attempts
            .map_or_else(|| String::from("unbounded"), |n| n.to_string())
    );

    loop {
        attempt = attempt.saturating_add(1);

        match attempt_once(&client, identity, local_config.clone(), settings).await {
            Ok(SyncOutcome::UpToDate) => {
                info!("[config-sync] Local configuration is up to date");
                return Ok(SyncOutcome::UpToDate);
            }
            Ok(outcome) => {
                if outcome.requires_restart() {
                    run_restart(restart).await;
                }
                return Ok(outcome);
            }
            Err(e) if e.is_retryable() => {
                warn!(
                    "[config-sync] Attempt {attempt} failed ({}): {e}",
                    e.error_category()
                );
            }
            Err(e) => {
                error!("[config-sync] Reconciliation aborted: {e}");
                return Err(e);
            }
        }

        if settings.max_attempts.is_some_and(|max| attempt >= max) {
            warn!("[config-sync] Giving up after {attempt} attempts, keeping existing configuration");
            return Ok(SyncOutcome::ExhaustedRetries);
        }

        let delay = poll_delay.next_backoff().unwrap_or(settings.poll_interval);
        debug!("[config-sync] Retrying in {delay:?}");
        TokioSleep(delay).await;
    }
}

async fn attempt_once(
    client: &ConfigClient,
    identity: &MachineIdentity,
    local_config: Option<serde_json::Value>,
    settings: &SyncSettings,
) -> Result<SyncOutcome, SyncError> {
    let remote_config = client.fetch(identity).await?;
    let record = ReconciliationRecord::new(local_config, remote_config)?;

    if record.is_current() {
        return Ok(SyncOutcome::UpToDate);
    }

    info!(
        "[config-sync] Configuration changed (local: {}, remote: {})",
        short_hash(&record.local_hash),
        short_hash(&record.remote_hash)
    );

    store::replace_atomically(&settings.local_path, &record.remote_config)?;
    Ok(SyncOutcome::Updated)
}

async fn run_restart(restart: Option<&dyn RestartHook>) {
    let Some(hook) = restart else {
        info!("[config-sync] Configuration updated, no restart hook configured");
        return;
    };

    match hook.restart().await {
        Ok(()) => info!("[config-sync] Restart requested"),
        Err(e) => error!("[config-sync] Restart failed, new configuration applies on next start: {e}"),
    }
}

fn short_hash(hash: &str) -> &str {
    if hash.is_empty() {
        "none"
    } else {
        &hash[..hash.len().min(12)]
    }
}

/// Run [`reconcile`] on a background task.
pub fn spawn_reconcile(
    settings: SyncSettings,
    identity: MachineIdentity,
    restart: Option<Arc<dyn RestartHook>>,
) -> JoinHandle<Result<SyncOutcome, SyncError>> {
    tokio::spawn(async move { reconcile(&settings, &identity, restart.as_deref()).await })
}

/// Re-run [`reconcile`] every `period`, forever, logging each outcome.
///
/// Abort the returned handle to stop. A resource error is logged and the schedule
/// continues; the next run retries the write.
pub fn spawn_periodic(
    settings: SyncSettings,
    identity: MachineIdentity,
    restart: Option<Arc<dyn RestartHook>>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            TokioSleep(period).await;

            match reconcile(&settings, &identity, restart.as_deref()).await {
                Ok(outcome) => debug!("[config-sync] Periodic run finished: {outcome}"),
                Err(e) => error!("[config-sync] Periodic run failed: {e}"),
            }
        }
    })
}
