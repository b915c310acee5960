//! Same echo loop as `client.rs`, over `wss://` with a custom CA bundle.

use std::fs;
use tidewire::{Connection, EventKind, Payload, WebSocketConfig};

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut config = WebSocketConfig::new();
    config.ca_file = fs::read_to_string("ca.crt").ok();

    let connection = Connection::connect("wss://localhost:9002", config);

    connection.on(EventKind::Open, |_| {
        log::info!("handshake complete, connection open");
    });
    connection.on(EventKind::Error, |event| {
        if let tidewire::Event::Error(err) = event {
            log::error!("connection error: {err}");
        }
    });
    connection.on(EventKind::Message, |event| {
        if let tidewire::Event::Message(message) = event {
            log::info!("received: {}", message.as_text().unwrap_or_default());
        }
    });

    if !connection.send(Payload::Text("hello over tls".into()), false, None).await {
        log::warn!("connection wasn't open yet, message dropped");
    }

    tokio::time::sleep(std::time::Duration::from_secs(30)).await;
}
