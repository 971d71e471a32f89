//! Classification of inbound WebSocket messages.

use models::InboundFrame;
use models::inbound_frame::FRAME_TYPE_FIELD;

use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

/// Heartbeat frame type, used both for peer requests and our own pings.
pub const HEARTBEAT_TYPE: &str = "ping";

/// Connection acknowledgement sent by the server after the handshake.
pub const CONTROL_TYPE: &str = "connection";

/// What the session loop should do with one inbound message.
#[derive(Debug)]
pub enum FrameDisposition {
    /// Forward to the frame handler.
    Application(InboundFrame),
    /// Peer asked for a heartbeat; answer with [`heartbeat_message`].
    HeartbeatRequest,
    /// Acknowledgement or other control frame; drop.
    Control,
    /// Not decodable as a JSON object; log and drop.
    Malformed(String),
    /// Transport-level message (ping, pong, raw frame) handled by the library.
    Transport,
    /// Peer closed the socket.
    Close,
}

pub fn classify(message: Message) -> FrameDisposition {
    match message {
        Message::Text(text) => classify_text(text.as_str()),
        Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
            Ok(text) => classify_text(text),
            Err(e) => FrameDisposition::Malformed(format!("Binary frame is not UTF-8: {e}")),
        },
        Message::Close(_) => FrameDisposition::Close,
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => FrameDisposition::Transport,
    }
}

pub fn classify_text(text: &str) -> FrameDisposition {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => return FrameDisposition::Malformed(format!("Invalid JSON: {e}")),
    };

    let frame = match InboundFrame::from_value(value) {
        Ok(frame) => frame,
        Err(e) => return FrameDisposition::Malformed(e.to_string()),
    };

    match frame.kind() {
        Some(HEARTBEAT_TYPE) => FrameDisposition::HeartbeatRequest,
        Some(CONTROL_TYPE) => FrameDisposition::Control,
        _ => FrameDisposition::Application(frame),
    }
}

/// `{"type":"ping"}` as a text message.
pub fn heartbeat_message() -> Message {
    Message::Text(json!({ FRAME_TYPE_FIELD: HEARTBEAT_TYPE }).to_string().into())
}
