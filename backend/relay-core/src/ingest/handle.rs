//! Handle returned by [`start`](crate::ingest::start).

use crate::ingest::lifecycle::{Lifecycle, LifecycleEvent, Transition};

use models::ConnectionState;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// State shared between the handle and its worker task.
pub(crate) struct Shared {
    account: String,
    lifecycle: Mutex<Lifecycle>,
    closed: watch::Sender<bool>,
}

impl Shared {
    pub(crate) fn new(account: impl Into<String>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            account: account.into(),
            lifecycle: Mutex::new(Lifecycle::new()),
            closed,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn account(&self) -> &str {
        &self.account
    }

    pub(crate) fn apply(&self, event: LifecycleEvent) -> Transition {
        let transition = self.lock().apply(event);

        match transition {
            Transition::Applied { from, to } => {
                debug!("[ingest:{}] {from} -> {to} ({event:?})", self.account)
            }
            Transition::Invalid => {
                debug!("[ingest:{}] Ignored {event:?}", self.account)
            }
            Transition::Suppressed => {}
        }

        transition
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.lock().state()
    }

    pub(crate) fn connect_attempts(&self) -> u64 {
        self.lock().connect_attempts()
    }

    pub(crate) fn open_sockets(&self) -> u8 {
        self.lock().open_sockets()
    }

    pub(crate) fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    /// Enter `Closed` and wake every waiter. Later calls are no-ops.
    pub(crate) fn stop(&self) {
        if self.apply(LifecycleEvent::Stop).is_applied() {
            info!("[ingest:{}] Stopped", self.account);
        }
        self.closed.send_replace(true);
    }
}

/// Owner of one ingestion connection.
///
/// Dropping the handle stops the connection. Call [`IngestHandle::join`] to wait for the
/// worker task to finish tearing the socket down.
pub struct IngestHandle {
    shared: Arc<Shared>,
    task: Option<JoinHandle<()>>,
}

impl IngestHandle {
    pub(crate) fn new(shared: Arc<Shared>, task: Option<JoinHandle<()>>) -> Self {
        Self { shared, task }
    }

    pub fn account(&self) -> &str {
        self.shared.account()
    }

    /// Stop the connection.
    ///
    /// Safe from any state and idempotent. Once this returns no frame handler starts
    /// or resumes, no reconnect is scheduled, and the heartbeat is cancelled. A handler
    /// suspended at an await point is dropped there.
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Dial attempts made so far, including the first.
    pub fn connect_attempts(&self) -> u64 {
        self.shared.connect_attempts()
    }

    /// Sockets currently open or opening.
    pub fn open_sockets(&self) -> u8 {
        self.shared.open_sockets()
    }

    /// Wait for the worker task to exit. Does not stop the connection by itself.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for IngestHandle {
    fn drop(&mut self) {
        self.shared.stop();
    }
}
