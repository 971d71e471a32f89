//! Process wiring.
//!
//! # Flow
//! 1. Read bootstrap settings, then bring up the logger
//! 2. Reconcile the local configuration file once, bounded by the sync timeout
//! 3. Load the (possibly replaced) file and start one ingestion connection per enabled account
//! 4. Optionally keep reconciling on a fixed period
//! 5. On Ctrl-C stop every connection and wait for the workers

use crate::error::RelayError;
use crate::logger::initialize as LoggerInitialize;

use relay_core::config::{BootstrapSettings, RelayConfig};
use relay_core::config_sync::{RestartHook, machine_identity, reconcile, spawn_periodic};
use relay_core::error::SyncError;
use relay_core::ingest::{IngestHandle, start as IngestStart};

use models::{InboundFrame, MachineIdentity, SyncOutcome};

use std::fs::create_dir_all;
use std::path::Path;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::signal::ctrl_c;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Run the relay until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the bootstrap settings are invalid, the logger cannot start,
/// or the startup reconciliation failed to write the configuration file.
pub async fn run() -> Result<(), RelayError> {
    let settings = BootstrapSettings::from_env()?;

    if let Some(log_dir) = &settings.log_dir {
        create_dir_all(log_dir).map_err(|e| {
            RelayError::relay(format!(
                "Failed to create log directory {}: {e}",
                log_dir.display()
            ))
        })?;
    }
    LoggerInitialize(settings.log_dir.as_deref())?;

    info!("Relay starting");
    info!("Configuration file: {}", settings.config_path.display());

    let restart = settings
        .restart_command
        .clone()
        .map(|command| Arc::new(command) as Arc<dyn RestartHook>);

    let identity = sync_on_startup(&settings, restart.as_deref()).await?;

    let config = load_accounts(&settings.config_path);
    let handles = start_accounts(&config);
    if handles.is_empty() {
        warn!("No enabled accounts in {}", settings.config_path.display());
    }

    let periodic = spawn_resync(&settings, identity, restart);

    ctrl_c()
        .await
        .map_err(|e| RelayError::relay(format!("Failed to listen for Ctrl-C: {e}")))?;

    info!("Shutdown requested");
    shutdown(handles, periodic).await;
    info!("Relay stopped");

    Ok(())
}

/// Run the startup reconciliation, if a sync endpoint is configured.
///
/// Returns the machine identity when reconciliation is enabled so periodic runs can
/// reuse it.
async fn sync_on_startup(
    settings: &BootstrapSettings,
    restart: Option<&dyn RestartHook>,
) -> Result<Option<MachineIdentity>, RelayError> {
    let Some(sync_settings) = settings.sync_settings() else {
        info!("[config-sync] No sync endpoint configured, using local configuration as-is");
        return Ok(None);
    };

    let identity = match machine_identity() {
        Ok(identity) => identity.clone(),
        Err(e) => {
            warn!("[config-sync] Skipping reconciliation: {e}");
            return Ok(None);
        }
    };

    let result = timeout(
        settings.sync_timeout,
        reconcile(&sync_settings, &identity, restart),
    )
    .await
    .ok();

    if result.is_none() {
        warn!(
            "[config-sync] No result within {:?}, continuing with existing configuration",
            settings.sync_timeout
        );
    }

    settle_startup_sync(result)?;
    Ok(Some(identity))
}

/// Decide whether a startup reconciliation result lets the process continue.
///
/// `None` means the run did not finish in time. Only a failed write of the local
/// file stops startup; everything else falls back to the existing configuration.
pub fn settle_startup_sync(
    result: Option<Result<SyncOutcome, SyncError>>,
) -> Result<(), RelayError> {
    match result {
        None => Ok(()),
        Some(Ok(SyncOutcome::ExhaustedRetries)) => {
            warn!("[config-sync] Remote configuration unavailable, continuing with existing configuration");
            Ok(())
        }
        Some(Ok(outcome)) => {
            info!("[config-sync] Startup reconciliation: {outcome}");
            Ok(())
        }
        Some(Err(e @ SyncError::Resource { .. })) => Err(e.into()),
        Some(Err(e)) => {
            warn!("[config-sync] Startup reconciliation failed, continuing: {e}");
            Ok(())
        }
    }
}

/// Load the account configuration, falling back to no accounts when the file is
/// unusable so the process stays up for the next reconciliation.
pub fn load_accounts(path: &Path) -> RelayConfig {
    RelayConfig::load(path).unwrap_or_else(|e| {
        error!("Configuration unusable, starting with no accounts: {e}");
        RelayConfig::default()
    })
}

/// Start one ingestion connection per enabled account.
pub fn start_accounts(config: &RelayConfig) -> Vec<IngestHandle> {
    config
        .enabled_accounts()
        .map(|(account, account_config)| {
            let settings = account_config.ingest_settings(account);
            let frame_account = account.to_string();
            let fatal_account = account.to_string();

            IngestStart(
                settings,
                move |frame: InboundFrame| log_frame(frame_account.clone(), frame),
                move |e| error!("[ingest:{fatal_account}] Connection disabled: {e}"),
            )
        })
        .collect()
}

async fn log_frame(account: String, frame: InboundFrame) {
    info!(
        "[ingest:{account}] Received {} frame",
        frame.kind().unwrap_or("untyped")
    );
    debug!("[ingest:{account}] Frame body: {}", frame.into_value());
}

fn spawn_resync(
    settings: &BootstrapSettings,
    identity: Option<MachineIdentity>,
    restart: Option<Arc<dyn RestartHook>>,
) -> Option<JoinHandle<()>> {
    let period = settings.sync_period?;
    let sync_settings = settings.sync_settings()?;
    let identity = identity?;

    info!("[config-sync] Re-syncing every {period:?}");
    Some(spawn_periodic(sync_settings, identity, restart, period))
}

/// Stop every connection, then wait for all workers to exit.
pub async fn shutdown(handles: Vec<IngestHandle>, periodic: Option<JoinHandle<()>>) {
    if let Some(periodic) = periodic {
        periodic.abort();
    }

    for handle in &handles {
        handle.stop();
    }

    for handle in handles {
        let account = handle.account().to_string();
        handle.join().await;
        debug!("[ingest:{account}] Joined");
    }
}
