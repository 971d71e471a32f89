//! Restart side effect fired after the local configuration was replaced.

use crate::error::SyncError;

use futures_util::future::BoxFuture;
use log::info;
use tokio::process::Command as TokioCommand;

/// Something that makes the process pick up a freshly written configuration.
///
/// Failures are reported back so the caller can log them; they never change the
/// reconciliation outcome.
pub trait RestartHook: Send + Sync {
    fn restart(&self) -> BoxFuture<'_, Result<(), SyncError>>;
}

/// Runs an external command, e.g. `systemctl restart relay`.
#[derive(Debug, Clone)]
pub struct CommandRestart {
    program: String,
    args: Vec<String>,
}

impl CommandRestart {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line. Returns `None` when it is blank.
    ///
    /// No shell parsing happens: quotes and backslashes are kept as literal characters,
    /// so an argument cannot contain spaces. Point at a wrapper script for anything
    /// more involved.
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    async fn run(&self) -> Result<(), SyncError> {
        info!("[config-sync] Running restart command: {} {:?}", self.program, self.args);

        let status = TokioCommand::new(&self.program)
            .args(&self.args)
            .status()
            .await
            .map_err(|e| {
                SyncError::restart(format!("Failed to launch {}: {e}", self.program))
            })?;

        if !status.success() {
            return Err(SyncError::restart(format!(
                "{} exited with {status}",
                self.program
            )));
        }

        Ok(())
    }
}

impl RestartHook for CommandRestart {
    fn restart(&self) -> BoxFuture<'_, Result<(), SyncError>> {
        Box::pin(self.run())
    }
}
