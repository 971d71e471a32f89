//! Worker task driving one ingestion connection.
//!
//! # Flow
//! 1. `Dial`, then open the socket under `connect_timeout`
//! 2. `Opened`: read frames and send heartbeats until the socket drops or stop is requested
//! 3. `Dropped`: close the socket, wait `reconnect_delay`, go back to 1
//!
//! Every wait selects on the closed signal first, so a stop cuts through connect,
//! session and reconnect delay alike.

use crate::error::IngestError;
use crate::ingest::frame::{FrameDisposition, classify, heartbeat_message};
use crate::ingest::handle::{IngestHandle, Shared};
use crate::ingest::handler::FrameHandler;
use crate::ingest::lifecycle::LifecycleEvent;
use crate::ingest::settings::IngestSettings;

use models::InboundFrame;

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::net::TcpStream;
use tokio::spawn as TokioSpawn;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep as TokioSleep, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Why a session ended without a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Stopped,
    PeerClosed,
}

/// Start an ingestion connection on the current tokio runtime.
///
/// The first dial happens immediately on a background task. Frames are delivered to
/// `on_frame` one at a time. `on_fatal` is only called when the endpoint cannot be built
/// from `settings`; the returned handle is then already `Closed`. Every other failure is
/// logged and retried after `reconnect_delay`.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn start<H, F>(settings: IngestSettings, on_frame: H, on_fatal: F) -> IngestHandle
where
    H: FrameHandler,
    F: Fn(IngestError),
{
    let shared = Arc::new(Shared::new(settings.account.clone()));

    let url = match settings.endpoint_url() {
        Ok(url) => url,
        Err(e) => {
            error!("[ingest:{}] Cannot start: {e}", settings.account);
            shared.stop();
            on_fatal(e);
            return IngestHandle::new(shared, None);
        }
    };

    info!(
        "[ingest:{}] Starting connection to {} (token: {})",
        settings.account,
        settings.display_endpoint(),
        settings.access_token
    );

    let task = TokioSpawn(run(settings, url, Arc::clone(&shared), on_frame));
    IngestHandle::new(shared, Some(task))
}

async fn run<H: FrameHandler>(settings: IngestSettings, url: Url, shared: Arc<Shared>, handler: H) {
    let account = settings.account.clone();
    let closed_rx = shared.closed_signal();
    let mut reconnect_delay = Constant::new(settings.reconnect_delay);

    loop {
        if !shared.apply(LifecycleEvent::Dial).is_applied() {
            break;
        }

        debug!(
            "[ingest:{account}] Connecting (attempt {})",
            shared.connect_attempts()
        );

        let connect = timeout(settings.connect_timeout, connect_async(url.as_str()));
        let connected = tokio::select! {
            biased;
            _ = closed(&closed_rx) => None,
            result = connect => Some(result),
        };

        match connected {
            None => {}
            Some(Ok(Ok((socket, _response)))) => {
                if shared.apply(LifecycleEvent::Opened).is_applied() {
                    info!("[ingest:{account}] Connected");
                    match drive_session(socket, &settings, &handler, &closed_rx).await {
                        Ok(SessionEnd::Stopped) => debug!("[ingest:{account}] Session stopped"),
                        Ok(SessionEnd::PeerClosed) => {
                            warn!("[ingest:{account}] Connection closed by peer")
                        }
                        Err(e) => warn!("[ingest:{account}] Connection lost: {e}"),
                    }
                } else {
                    close_socket(socket).await;
                }
            }
            Some(Ok(Err(e))) => {
                let error = IngestError::connect(e.to_string());
                warn!("[ingest:{account}] {error}");
            }
            Some(Err(_elapsed)) => {
                let error = IngestError::connect(format!(
                    "No handshake within {:?}",
                    settings.connect_timeout
                ));
                warn!("[ingest:{account}] {error}");
            }
        }

        shared.apply(LifecycleEvent::Dropped);

        if shared.is_closed() {
            break;
        }

        let delay = reconnect_delay
            .next_backoff()
            .unwrap_or(settings.reconnect_delay);
        info!("[ingest:{account}] Reconnecting in {delay:?}");

        tokio::select! {
            biased;
            _ = closed(&closed_rx) => break,
            _ = TokioSleep(delay) => {}
        }
    }

    debug!("[ingest:{account}] Worker exited");
}

async fn drive_session<H: FrameHandler>(
    socket: Socket,
    settings: &IngestSettings,
    handler: &H,
    closed_rx: &watch::Receiver<bool>,
) -> Result<SessionEnd, IngestError> {
    let account = settings.account.as_str();
    let (mut write, mut read) = socket.split();

    let period = settings.heartbeat_interval;
    let mut heartbeat = interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result = loop {
        tokio::select! {
            biased;
            _ = closed(closed_rx) => break Ok(SessionEnd::Stopped),
            _ = heartbeat.tick() => {
                debug!("[ingest:{account}] Sending heartbeat");
                if let Err(e) = write.send(heartbeat_message()).await {
                    break Err(IngestError::send(format!("Heartbeat failed: {e}")));
                }
            }
            message = read.next() => {
                let message = match message {
                    None => break Ok(SessionEnd::PeerClosed),
                    Some(Err(e)) => break Err(IngestError::read(e.to_string())),
                    Some(Ok(message)) => message,
                };

                match classify(message) {
                    FrameDisposition::Application(frame) => {
                        if !dispatch(handler, frame, closed_rx).await {
                            break Ok(SessionEnd::Stopped);
                        }
                    }
                    FrameDisposition::HeartbeatRequest => {
                        debug!("[ingest:{account}] Answering heartbeat request");
                        if let Err(e) = write.send(heartbeat_message()).await {
                            break Err(IngestError::send(format!("Heartbeat reply failed: {e}")));
                        }
                    }
                    FrameDisposition::Control => {
                        debug!("[ingest:{account}] Control frame dropped");
                    }
                    FrameDisposition::Malformed(reason) => {
                        warn!("[ingest:{account}] Dropping malformed frame: {reason}");
                    }
                    FrameDisposition::Transport => {}
                    FrameDisposition::Close => break Ok(SessionEnd::PeerClosed),
                }
            }
        }
    };

    match timeout(CLOSE_TIMEOUT, write.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("[ingest:{account}] Close handshake failed: {e}"),
        Err(_) => debug!("[ingest:{account}] Close handshake timed out"),
    }

    result
}

/// Run the handler for one frame unless stop wins first.
///
/// Returns `false` if the closed signal fired before or during the handler.
async fn dispatch<H: FrameHandler>(
    handler: &H,
    frame: InboundFrame,
    closed_rx: &watch::Receiver<bool>,
) -> bool {
    if *closed_rx.borrow() {
        return false;
    }

    let handling = handler.on_frame(frame);

    tokio::select! {
        biased;
        _ = closed(closed_rx) => false,
        _ = handling => true,
    }
}

async fn close_socket(mut socket: Socket) {
    let _ = timeout(CLOSE_TIMEOUT, socket.close(None)).await;
}

/// Resolves once the connection has been stopped (or the handle is gone).
async fn closed(closed_rx: &watch::Receiver<bool>) {
    let mut closed_rx = closed_rx.clone();
    let _ = closed_rx.wait_for(|closed| *closed).await;
}
