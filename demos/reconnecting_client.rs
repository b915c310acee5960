//! Demonstrates automatic reconnect: set `reconnect_interval_ms` and the
//! connection redials on its own whenever the read loop ends, counting
//! attempts via [`Connection::reconnect_count`].

use tidewire::{Connection, EventKind, WebSocketConfig};

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut config = WebSocketConfig::new();
    config.reconnect_interval_ms = 2_000;

    let connection = Connection::connect("ws://127.0.0.1:9002", config);

    connection.on(EventKind::Open, |_| {
        log::info!("connected");
    });
    connection.on(EventKind::Close, |event| {
        if let tidewire::Event::Close(code, reason) = event {
            log::warn!("closed: code={code:?} reason={reason}");
        }
    });
    connection.on(EventKind::Error, |event| {
        if let tidewire::Event::Error(err) = event {
            log::error!("error: {err}");
        }
    });

    loop {
        tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        log::info!("reconnect count so far: {}", connection.reconnect_count());
    }
}
