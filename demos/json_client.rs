//! `json` payload mode: outbound values are JSON-stringified, inbound text
//! frames are precheck-parsed and malformed payloads are silently dropped
//! (§4.6).

use serde_json::json;
use tidewire::{Connection, EventKind, Payload, PayloadKind, WebSocketConfig};

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut config = WebSocketConfig::new();
    config.payload_kind = PayloadKind::Json;

    let connection = Connection::connect("ws://127.0.0.1:9002", config);

    connection.on(EventKind::Message, |event| {
        if let tidewire::Event::Message(tidewire::Message::Json(value)) = event {
            log::info!("received json: {value}");
        }
    });

    let payload = Payload::Json(json!({"type": "greeting", "text": "hello"}));
    if !connection.send(payload, false, None).await {
        log::warn!("connection wasn't open yet, message dropped");
    }

    tokio::time::sleep(std::time::Duration::from_secs(15)).await;
}
