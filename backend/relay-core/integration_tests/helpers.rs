//! Test helpers for the integration tests.
//!
//! - An in-process WebSocket server that hands each accepted connection to the test
//! - Polling helpers for handle state
//! - Fixed machine identity and a counting restart hook

use relay_core::config_sync::RestartHook;
use relay_core::error::SyncError;
use relay_core::ingest::IngestHandle;

use models::{ConnectionState, MachineIdentity, MachineIdentityBuilder};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, timeout};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

pub const WAIT: Duration = Duration::from_secs(5);

// ============================================
// WEBSOCKET TEST SERVER
// ============================================

/// Counters shared with the accept loop.
#[derive(Default)]
pub struct ServerStats {
    pub accepted: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub stats: Arc<ServerStats>,
    connections: mpsc::UnboundedReceiver<PeerConnection>,
}

/// Server side of one accepted connection.
pub struct PeerConnection {
    /// Request path and query of the upgrade request.
    pub uri: String,
    outgoing: mpsc::UnboundedSender<Message>,
    incoming: mpsc::UnboundedReceiver<String>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let addr = listener.local_addr().expect("local addr");
        let stats = Arc::new(ServerStats::default());
        let (connections_tx, connections) = mpsc::unbounded_channel();

        let accept_stats = Arc::clone(&stats);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let captured = Arc::new(Mutex::new(String::new()));
                let callback_uri = Arc::clone(&captured);
                let callback =
                    move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                        *callback_uri.lock().expect("uri lock") = request.uri().to_string();
                        Ok(response)
                    };

                let Ok(socket) = accept_hdr_async(stream, callback).await else {
                    continue;
                };

                accept_stats.accepted.fetch_add(1, Ordering::SeqCst);
                let now_active = accept_stats.active.fetch_add(1, Ordering::SeqCst) + 1;
                accept_stats.max_active.fetch_max(now_active, Ordering::SeqCst);

                let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
                let (incoming_tx, incoming) = mpsc::unbounded_channel::<String>();
                let uri = captured.lock().expect("uri lock").clone();

                let _ = connections_tx.send(PeerConnection {
                    uri,
                    outgoing,
                    incoming,
                });

                let conn_stats = Arc::clone(&accept_stats);
                tokio::spawn(async move {
                    let (mut write, mut read) = socket.split();
                    loop {
                        tokio::select! {
                            command = outgoing_rx.recv() => match command {
                                Some(message) => {
                                    let is_close = matches!(message, Message::Close(_));
                                    if write.send(message).await.is_err() || is_close {
                                        break;
                                    }
                                }
                                None => break,
                            },
                            message = read.next() => match message {
                                Some(Ok(Message::Text(text))) => {
                                    let _ = incoming_tx.send(text.as_str().to_string());
                                }
                                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                                Some(Ok(_)) => {}
                            },
                        }
                    }
                    conn_stats.active.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        Self {
            addr,
            stats,
            connections,
        }
    }

    pub fn base_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Wait for the next accepted connection.
    pub async fn next_connection(&mut self) -> PeerConnection {
        timeout(WAIT, self.connections.recv())
            .await
            .expect("Timed out waiting for a connection")
            .expect("Accept loop ended")
    }

    /// `true` if no connection arrives within `window`.
    pub async fn no_connection_within(&mut self, window: Duration) -> bool {
        timeout(window, self.connections.recv()).await.is_err()
    }

    pub fn accepted(&self) -> usize {
        self.stats.accepted.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.stats.max_active.load(Ordering::SeqCst)
    }
}

impl PeerConnection {
    pub fn send_text(&self, text: &str) {
        self.outgoing
            .send(Message::Text(text.to_string().into()))
            .expect("Connection task ended");
    }

    pub fn send_json(&self, value: &Value) {
        self.send_text(&value.to_string());
    }

    /// Close from the server side.
    pub fn close(&self) {
        let _ = self.outgoing.send(Message::Close(None));
    }

    /// Next text frame sent by the client, or `None` on timeout or disconnect.
    pub async fn recv_text(&mut self, within: Duration) -> Option<String> {
        timeout(within, self.incoming.recv()).await.ok().flatten()
    }

    pub async fn recv_json(&mut self, within: Duration) -> Option<Value> {
        let text = self.recv_text(within).await?;
        Some(serde_json::from_str(&text).expect("Client sent invalid JSON"))
    }

    /// `true` once the client side has gone away.
    pub async fn is_disconnected(&mut self, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            match timeout(deadline.saturating_duration_since(Instant::now()), self.incoming.recv()).await {
                Ok(None) => return true,
                Ok(Some(_)) => continue,
                Err(_) => return false,
            }
        }
        false
    }
}

// ============================================
// HANDLE POLLING
// ============================================

pub async fn wait_for_state(handle: &IngestHandle, state: ConnectionState) {
    let deadline = Instant::now() + WAIT;
    while handle.state() != state {
        assert!(
            Instant::now() < deadline,
            "Timed out waiting for {state}, still {}",
            handle.state()
        );
        sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_for_attempts(handle: &IngestHandle, attempts: u64) {
    let deadline = Instant::now() + WAIT;
    while handle.connect_attempts() < attempts {
        assert!(
            Instant::now() < deadline,
            "Timed out waiting for {attempts} attempts, saw {}",
            handle.connect_attempts()
        );
        sleep(Duration::from_millis(10)).await;
    }
}

// ============================================
// CONFIG SYNC FIXTURES
// ============================================

pub fn test_identity() -> MachineIdentity {
    MachineIdentityBuilder::default()
        .with_ip("192.168.1.20")
        .with_hostname("relay-test")
        .with_os_type("Linux")
        .with_os_version("6.8.0")
        .with_os_arch("x86_64")
        .build()
        .expect("valid identity")
}

/// Restart hook that counts calls and optionally fails.
#[derive(Default)]
pub struct CountingRestart {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl CountingRestart {
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RestartHook for CountingRestart {
    fn restart(&self) -> BoxFuture<'_, Result<(), SyncError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail;
        Box::pin(async move {
            if fail {
                Err(SyncError::restart("simulated failure"))
            } else {
                Ok(())
            }
        })
    }
}
