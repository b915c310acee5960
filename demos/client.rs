//! Bare-bones echo client: connect, send a line every 5 seconds, print
//! whatever comes back, stop after three round trips.

use rand::distr::Alphanumeric;
use rand::{thread_rng, Rng};
use tidewire::{Connection, EventKind, Payload, WebSocketConfig};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

fn generate_random_string() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(30)
        .map(char::from)
        .collect()
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let connection = Connection::connect("ws://127.0.0.1:9002", WebSocketConfig::new());

    let (tx, mut rx) = mpsc::unbounded_channel();
    connection.on(EventKind::Message, move |event| {
        if let tidewire::Event::Message(message) = event {
            let _ = tx.send(message.clone());
        }
    });

    let mut ticker = interval(Duration::from_secs(5));
    let mut received = 0;

    loop {
        tokio::select! {
            Some(message) = rx.recv() => {
                println!("received: {}", message.as_text().unwrap_or_default());
                received += 1;
                if received >= 3 {
                    connection.close(tidewire::CloseReason::Normal, 1000).await;
                    break;
                }
            }
            _ = ticker.tick() => {
                let payload = Payload::Text(generate_random_string());
                if !connection.send(payload, false, None).await {
                    eprintln!("failed to send message, connection not open");
                }
            }
        }
    }
}
