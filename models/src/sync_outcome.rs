use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::Serialize;

/// Terminal result of one configuration reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncOutcome {
    /// Local and remote configuration hash the same. Nothing was written.
    UpToDate,
    /// The local file was replaced with the remote configuration.
    Updated,
    /// Every attempt failed; the local file was left as it was.
    ExhaustedRetries,
}

impl SyncOutcome {
    /// Whether the restart side effect should fire for this outcome.
    pub fn requires_restart(&self) -> bool {
        matches!(self, SyncOutcome::Updated)
    }
}

impl Display for SyncOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        let name = match self {
            SyncOutcome::UpToDate => "up-to-date",
            SyncOutcome::Updated => "updated",
            SyncOutcome::ExhaustedRetries => "exhausted-retries",
        };
        f.write_str(name)
    }
}
