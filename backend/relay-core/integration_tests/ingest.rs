use crate::helpers::{TestServer, WAIT, wait_for_attempts, wait_for_state};

use relay_core::ingest::{IngestHandle, IngestSettings, start};

use common::RedactedToken;
use models::{ConnectionState, InboundFrame};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout};

const TOKEN: &str = "test-token-12345";

fn settings(server: &TestServer) -> IngestSettings {
    IngestSettings::new("test", server.base_url(), RedactedToken::new(TOKEN))
        .with_heartbeat_interval(Duration::from_secs(60))
        .with_reconnect_delay(Duration::from_millis(50))
        .with_connect_timeout(Duration::from_secs(2))
}

/// Start a connection whose frames land in the returned channel.
fn start_collecting(settings: IngestSettings) -> (IngestHandle, mpsc::UnboundedReceiver<Value>) {
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let handle = start(
        settings,
        move |frame: InboundFrame| {
            let frames_tx = frames_tx.clone();
            async move {
                let _ = frames_tx.send(frame.into_value());
            }
        },
        |e| panic!("unexpected fatal error: {e}"),
    );
    (handle, frames_rx)
}

async fn next_frame(frames: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    timeout(WAIT, frames.recv())
        .await
        .expect("Timed out waiting for a frame")
        .expect("Frame channel closed")
}

/// **VALUE**: Verifies the connection carries the path suffix and the access token.
///
/// **WHY THIS MATTERS**: The server authenticates by the `accessToken` query parameter.
///
/// **BUG THIS CATCHES**: Would catch a missing suffix or the token being sent elsewhere.
#[tokio::test]
async fn given_server_when_started_then_connects_with_token_query() {
    // GIVEN: A running server
    let mut server = TestServer::start().await;

    // WHEN: Starting a connection
    let (handle, _frames) = start_collecting(settings(&server));

    // THEN: The upgrade request hit /ws with the token, and the handle is connected
    let peer = server.next_connection().await;
    assert_eq!(peer.uri, format!("/ws?accessToken={TOKEN}"));
    wait_for_state(&handle, ConnectionState::Connected).await;
    assert_eq!(handle.connect_attempts(), 1);

    handle.stop();
}

/// **VALUE**: Verifies application frames arrive in order while control, heartbeat and
/// malformed frames are filtered out.
///
/// **WHY THIS MATTERS**: The handler must only ever see application frames, and a bad
/// frame must not cost the connection.
///
/// **BUG THIS CATCHES**: Would catch reordering, control frames leaking to the handler,
/// or a parse error tearing the socket down.
#[tokio::test]
async fn given_mixed_frames_when_received_then_only_application_frames_forwarded_in_order() {
    // GIVEN: A connected client
    let mut server = TestServer::start().await;
    let (handle, mut frames) = start_collecting(settings(&server));
    let mut peer = server.next_connection().await;

    // WHEN: The server sends a mix of frames
    peer.send_json(&json!({"type": "connection", "status": "ok"}));
    peer.send_text("{this is not json");
    peer.send_json(&json!({"type": "message", "seq": 1}));
    peer.send_json(&json!([1, 2, 3]));
    peer.send_json(&json!({"seq": 2}));
    peer.send_json(&json!({"type": "ping"}));
    peer.send_json(&json!({"type": "message", "seq": 3}));

    // THEN: Exactly the three application frames, in order
    assert_eq!(next_frame(&mut frames).await, json!({"type": "message", "seq": 1}));
    assert_eq!(next_frame(&mut frames).await, json!({"seq": 2}));
    assert_eq!(next_frame(&mut frames).await, json!({"type": "message", "seq": 3}));
    assert!(
        timeout(Duration::from_millis(200), frames.recv()).await.is_err(),
        "no further frames expected"
    );

    // THEN: Still on the first connection
    assert_eq!(handle.state(), ConnectionState::Connected);
    assert_eq!(server.accepted(), 1);

    // THEN: The ping was answered exactly once
    assert_eq!(
        peer.recv_json(WAIT).await,
        Some(json!({"type": "ping"}))
    );
    assert_eq!(peer.recv_text(Duration::from_millis(200)).await, None);

    handle.stop();
}

/// **VALUE**: Verifies a heartbeat reply is on the wire before the next frame is handled.
///
/// **WHY THIS MATTERS**: The server times out peers whose replies are late. A slow
/// handler queued ahead of the reply would get the connection dropped.
///
/// **BUG THIS CATCHES**: Would catch the reply being deferred until after later frames
/// are dispatched. The handler for seq 3 waits for the peer to see the reply, so a
/// deferred reply can never arrive in time.
#[tokio::test]
async fn given_ping_then_frame_when_received_then_reply_sent_before_frame_handled() {
    // GIVEN: A handler that, on seq 3, waits until the peer has seen the ping reply
    let mut server = TestServer::start().await;
    let (reply_seen_tx, reply_seen_rx) = watch::channel(false);
    let (verdict_tx, mut verdict_rx) = mpsc::unbounded_channel();
    let handle = start(
        settings(&server),
        move |frame: InboundFrame| {
            let mut reply_seen = reply_seen_rx.clone();
            let verdict_tx = verdict_tx.clone();
            async move {
                if frame.into_value().get("seq") == Some(&json!(3)) {
                    let seen_first =
                        timeout(Duration::from_secs(2), reply_seen.wait_for(|seen| *seen))
                            .await
                            .is_ok_and(|changed| changed.is_ok());
                    let _ = verdict_tx.send(seen_first);
                }
            }
        },
        |e| panic!("unexpected fatal error: {e}"),
    );
    let mut peer = server.next_connection().await;

    // WHEN: The server sends a ping immediately followed by an application frame
    peer.send_json(&json!({"type": "ping"}));
    peer.send_json(&json!({"type": "message", "seq": 3}));

    // THEN: The reply reaches the peer
    assert_eq!(peer.recv_json(WAIT).await, Some(json!({"type": "ping"})));
    reply_seen_tx.send_replace(true);

    // AND: The handler for seq 3 observed it before returning
    let seen_first = timeout(WAIT, verdict_rx.recv())
        .await
        .expect("Timed out waiting for the handler")
        .expect("Verdict channel closed");
    assert!(seen_first, "seq 3 was handled before the ping reply was sent");

    handle.stop();
}

/// **VALUE**: Verifies the client sends its own heartbeat on the configured period.
///
/// **BUG THIS CATCHES**: Would catch the heartbeat timer never being armed after open.
#[tokio::test]
async fn given_short_heartbeat_interval_when_connected_then_heartbeats_are_sent() {
    let mut server = TestServer::start().await;
    let (handle, _frames) = start_collecting(
        settings(&server).with_heartbeat_interval(Duration::from_millis(100)),
    );
    let mut peer = server.next_connection().await;

    assert_eq!(peer.recv_json(WAIT).await, Some(json!({"type": "ping"})));
    assert_eq!(peer.recv_json(WAIT).await, Some(json!({"type": "ping"})));

    handle.stop();
}

/// **VALUE**: Verifies a server-side close leads to exactly one new connection after the
/// reconnect delay.
///
/// **WHY THIS MATTERS**: The relay must recover from restarts of the chat server without
/// ever holding two sockets for one account.
///
/// **BUG THIS CATCHES**: Would catch missing reconnects, overlapping sockets, or frames
/// being lost on the new connection.
#[tokio::test]
async fn given_server_closes_when_reconnect_delay_elapses_then_reconnects_once() {
    // GIVEN: A connected client
    let mut server = TestServer::start().await;
    let (handle, mut frames) = start_collecting(settings(&server));
    let first = server.next_connection().await;
    wait_for_state(&handle, ConnectionState::Connected).await;

    // WHEN: The server closes the connection
    first.close();

    // THEN: A second connection arrives and works
    let second = server.next_connection().await;
    wait_for_state(&handle, ConnectionState::Connected).await;
    second.send_json(&json!({"type": "message", "after": "reconnect"}));
    assert_eq!(
        next_frame(&mut frames).await,
        json!({"type": "message", "after": "reconnect"})
    );

    // THEN: Never more than one socket at a time
    assert_eq!(server.accepted(), 2);
    assert_eq!(server.max_active(), 1);
    assert_eq!(handle.connect_attempts(), 2);
    assert!(handle.open_sockets() <= 1);

    handle.stop();
}

/// **VALUE**: Verifies a refused connection keeps retrying with the fixed delay.
///
/// **WHY THIS MATTERS**: The chat server may be down when the relay starts.
///
/// **BUG THIS CATCHES**: Would catch a failed first connect ending the worker.
#[tokio::test]
async fn given_unreachable_endpoint_when_started_then_keeps_retrying() {
    let settings = IngestSettings::new("test", "ws://127.0.0.1:1", RedactedToken::new(TOKEN))
        .with_reconnect_delay(Duration::from_millis(20));

    let (handle, _frames) = start_collecting(settings);

    wait_for_attempts(&handle, 3).await;
    assert_ne!(handle.state(), ConnectionState::Closed);

    handle.stop();
    timeout(WAIT, handle.join()).await.expect("worker exits");
}

/// **VALUE**: Verifies stop during the reconnect wait cancels the pending reconnect.
///
/// **WHY THIS MATTERS**: After stop returns nothing may dial again.
///
/// **BUG THIS CATCHES**: Would catch a reconnect timer that survives stop.
#[tokio::test]
async fn given_reconnect_pending_when_stopped_then_no_further_connections() {
    // GIVEN: A dropped connection waiting out a long reconnect delay
    let mut server = TestServer::start().await;
    let (handle, _frames) = start_collecting(
        settings(&server).with_reconnect_delay(Duration::from_millis(500)),
    );
    let peer = server.next_connection().await;
    wait_for_state(&handle, ConnectionState::Connected).await;
    peer.close();
    wait_for_state(&handle, ConnectionState::ReconnectPending).await;

    // WHEN: Stopping
    handle.stop();

    // THEN: Closed, and no dial after the delay would have elapsed
    assert_eq!(handle.state(), ConnectionState::Closed);
    assert!(server.no_connection_within(Duration::from_millis(800)).await);
    assert_eq!(server.accepted(), 1);
    timeout(WAIT, handle.join()).await.expect("worker exits");
}

/// **VALUE**: Verifies stop is idempotent and closes the open socket.
///
/// **BUG THIS CATCHES**: Would catch a second stop panicking or the socket leaking.
#[tokio::test]
async fn given_connected_when_stopped_twice_then_closed_and_socket_released() {
    // GIVEN: A connected client
    let mut server = TestServer::start().await;
    let (handle, _frames) = start_collecting(settings(&server));
    let mut peer = server.next_connection().await;
    wait_for_state(&handle, ConnectionState::Connected).await;

    // WHEN: Stopping twice
    handle.stop();
    handle.stop();

    // THEN: Closed, the server sees the disconnect, and the worker exits
    assert_eq!(handle.state(), ConnectionState::Closed);
    assert!(peer.is_disconnected(WAIT).await);
    timeout(WAIT, handle.join()).await.expect("worker exits");
}

/// **VALUE**: Verifies no handler runs after stop returns, even with frames queued.
///
/// **WHY THIS MATTERS**: The host may tear down the handler's resources right after stop.
///
/// **BUG THIS CATCHES**: Would catch the session loop draining buffered frames after stop.
#[tokio::test]
async fn given_slow_handler_when_stopped_then_no_further_invocations() {
    // GIVEN: A handler that takes a while per frame
    let mut server = TestServer::start().await;
    let started = Arc::new(AtomicUsize::new(0));
    let handler_started = Arc::clone(&started);
    let handle = start(
        settings(&server),
        move |_frame: InboundFrame| {
            handler_started.fetch_add(1, Ordering::SeqCst);
            async move {
                sleep(Duration::from_millis(300)).await;
            }
        },
        |e| panic!("unexpected fatal error: {e}"),
    );
    let peer = server.next_connection().await;

    // WHEN: Several frames are queued and stop is called while the first is handled
    for seq in 0..5 {
        peer.send_json(&json!({"type": "message", "seq": seq}));
    }
    let deadline = tokio::time::Instant::now() + WAIT;
    while started.load(Ordering::SeqCst) == 0 {
        assert!(tokio::time::Instant::now() < deadline, "handler never started");
        sleep(Duration::from_millis(5)).await;
    }
    handle.stop();
    let count_at_stop = started.load(Ordering::SeqCst);

    // THEN: The worker exits promptly and no further handler starts
    timeout(Duration::from_secs(1), handle.join())
        .await
        .expect("worker exits without finishing the handler");
    sleep(Duration::from_millis(100)).await;
    assert_eq!(started.load(Ordering::SeqCst), count_at_stop);
    assert_eq!(count_at_stop, 1);
}

/// **VALUE**: Verifies an unusable endpoint is reported once through `on_fatal`.
///
/// **WHY THIS MATTERS**: This is the only failure that stops the manager by itself.
///
/// **BUG THIS CATCHES**: Would catch a worker spinning on an endpoint that can never work.
#[tokio::test]
async fn given_invalid_endpoint_when_started_then_fatal_reported_and_closed() {
    let fatal_calls = Arc::new(AtomicUsize::new(0));
    let fatal_counter = Arc::clone(&fatal_calls);

    let handle = start(
        IngestSettings::new("test", "http://not-a-websocket", RedactedToken::new(TOKEN)),
        |_frame: InboundFrame| async {},
        move |_e| {
            fatal_counter.fetch_add(1, Ordering::SeqCst);
        },
    );

    assert_eq!(fatal_calls.load(Ordering::SeqCst), 1);
    assert_eq!(handle.state(), ConnectionState::Closed);
    assert_eq!(handle.connect_attempts(), 0);
    timeout(WAIT, handle.join()).await.expect("no worker to wait for");
}

/// **VALUE**: Verifies dropping the handle stops the connection.
#[tokio::test]
async fn given_handle_when_dropped_then_connection_closed() {
    let mut server = TestServer::start().await;
    let (handle, _frames) = start_collecting(settings(&server));
    let mut peer = server.next_connection().await;
    wait_for_state(&handle, ConnectionState::Connected).await;

    drop(handle);

    assert!(peer.is_disconnected(WAIT).await);
    assert!(server.no_connection_within(Duration::from_millis(300)).await);
}
