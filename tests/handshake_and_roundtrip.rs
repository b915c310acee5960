//! End-to-end tests against a hand-rolled loopback server: no mocking of
//! `Connection` internals, just a real TCP accept loop that speaks just
//! enough RFC 6455 server-side to exercise the client's handshake, framing,
//! and reconnect paths. Mirrors the shape of the teacher's
//! `examples/echo_server.rs`, inlined here so the test doesn't depend on
//! accepting being in scope (this crate is client-only).

use std::time::Duration;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use tidewire::{CloseReason, Connection, Event, EventKind, Message, Payload, WebSocketConfig};

const ACCEPT_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

async fn accept_handshake(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte).await.unwrap();
        buf.push(byte[0]);
        if buf.len() >= 4 && &buf[buf.len() - 4..] == b"\r\n\r\n" {
            break;
        }
    }
    let request = String::from_utf8_lossy(&buf);
    let key = request
        .lines()
        .find_map(|line| line.strip_prefix("Sec-WebSocket-Key: "))
        .expect("client should send Sec-WebSocket-Key")
        .trim()
        .to_string();

    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(ACCEPT_GUID.as_bytes());
    let accept = BASE64_STANDARD.encode(sha1.finalize());

    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {accept}\r\n\r\n"
    );
    stream.write_all(response.as_bytes()).await.unwrap();
}

fn unmask(mut payload: Vec<u8>, mask: [u8; 4]) -> Vec<u8> {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
    payload
}

/// Read one client-to-server frame off `stream`, returning (opcode, payload).
/// Client frames are always masked per RFC 6455, so this always unmasks.
async fn read_client_frame(stream: &mut TcpStream) -> (u8, Vec<u8>) {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await.unwrap();
    let opcode = header[0] & 0x0F;
    let masked = header[1] & 0x80 != 0;
    let mut len = (header[1] & 0x7F) as usize;

    if len == 126 {
        let mut ext = [0u8; 2];
        stream.read_exact(&mut ext).await.unwrap();
        len = u16::from_be_bytes(ext) as usize;
    } else if len == 127 {
        let mut ext = [0u8; 8];
        stream.read_exact(&mut ext).await.unwrap();
        len = u64::from_be_bytes(ext) as usize;
    }

    let mask = if masked {
        let mut mask = [0u8; 4];
        stream.read_exact(&mut mask).await.unwrap();
        Some(mask)
    } else {
        None
    };

    let mut payload = vec![0u8; len];
    if len > 0 {
        stream.read_exact(&mut payload).await.unwrap();
    }
    if let Some(mask) = mask {
        payload = unmask(payload, mask);
    }

    (opcode, payload)
}

fn encode_unmasked_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0x80 | opcode];
    if payload.len() <= 125 {
        out.push(payload.len() as u8);
    } else if payload.len() <= 65535 {
        out.push(126);
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    } else {
        out.push(127);
        out.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    }
    out.extend_from_slice(payload);
    out
}

#[tokio::test]
async fn handshake_then_text_echo_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        accept_handshake(&mut stream).await;

        let (opcode, payload) = read_client_frame(&mut stream).await;
        assert_eq!(opcode, 0x1);
        assert_eq!(payload, b"hello from client");

        stream
            .write_all(&encode_unmasked_frame(0x1, b"hello from server"))
            .await
            .unwrap();
    });

    let mut config = WebSocketConfig::new();
    config.compress = false;
    let connection = Connection::connect(format!("ws://{addr}"), config);

    let (tx, mut rx) = mpsc::unbounded_channel();
    connection.on(EventKind::Open, move |_| {
        let _ = tx.send(());
    });
    let opened = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("should open before timing out");
    assert!(opened.is_some());

    let (msg_tx, mut msg_rx) = mpsc::unbounded_channel();
    connection.on(EventKind::Message, move |event| {
        if let Event::Message(message) = event {
            let _ = msg_tx.send(message.clone());
        }
    });

    assert!(
        connection
            .send(Payload::Text("hello from client".into()), false, None)
            .await
    );

    let message = tokio::time::timeout(Duration::from_secs(5), msg_rx.recv())
        .await
        .expect("should receive echoed message")
        .unwrap();
    assert_eq!(message, Message::Text("hello from server".to_string()));

    server.await.unwrap();
}

#[tokio::test]
async fn close_frame_from_peer_emits_close_event_with_code_and_reason() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        accept_handshake(&mut stream).await;

        let mut close_payload = 1000u16.to_be_bytes().to_vec();
        close_payload.extend_from_slice(b"bye");
        stream
            .write_all(&encode_unmasked_frame(0x8, &close_payload))
            .await
            .unwrap();

        // Client must answer with its own close frame.
        let (opcode, _) = read_client_frame(&mut stream).await;
        assert_eq!(opcode, 0x8);
    });

    let mut config = WebSocketConfig::new();
    config.compress = false;
    let connection = Connection::connect(format!("ws://{addr}"), config);

    let (tx, mut rx) = mpsc::unbounded_channel();
    connection.on(EventKind::Close, move |event| {
        if let Event::Close(code, reason) = event {
            let _ = tx.send((*code, reason.clone()));
        }
    });

    let (code, reason) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("should see a close event")
        .unwrap();
    assert_eq!(code, Some(1000));
    assert_eq!(reason, "bye");

    server.await.unwrap();
}

#[tokio::test]
async fn reconnect_counter_increments_after_server_drops_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        for _ in 0..2 {
            let (mut stream, _) = listener.accept().await.unwrap();
            accept_handshake(&mut stream).await;
            drop(stream);
        }
    });

    let mut config = WebSocketConfig::new();
    config.compress = false;
    config.reconnect_interval_ms = 50;
    let connection = Connection::connect(format!("ws://{addr}"), config);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(connection.reconnect_count() >= 1);

    connection
        .close(CloseReason::Normal, 1000)
        .await;
    let _ = server.await;
}
