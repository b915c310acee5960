//! The public entry point: `Connection` owns the lifecycle state machine,
//! the reconnect loop, and the shared writer every `send`/`ping`/`close`
//! call goes through.
//!
//! The teacher never reconnects — a `ReadStream` running out (EOF, error,
//! or a close frame) just ends the connection. Here that same "read loop
//! stopped" signal feeds a loop that decides whether to redial, so the
//! state lives in a `Shared` struct outside any one task's stack instead of
//! on `main`'s.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::compression::{Deflate, Inflate};
use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::event::{Event, EventKind, Handlers, SubscriptionId};
use crate::frame::{Frame, OpCode};
use crate::handshake;
use crate::message;
use crate::read::ReadStream;
use crate::write::Writer;

/// Where `close()` leaves the connection: the RFC 6455 default of "stay
/// closed", or the teacher's `close(true)` idiom preserved as a named
/// variant — keep the automatic-reconnect loop running afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Normal,
    KeepReconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Closed,
    Connecting,
    Open,
    Closing,
}

/// What a caller wants delivered to the peer. `Raw` skips JSON stringifying
/// even in `json` mode, mirroring §4.7's `raw` flag on `send`.
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
    Json(serde_json::Value),
    Raw(Vec<u8>),
}

struct Shared {
    url: String,
    config: WebSocketConfig,
    lifecycle: StdMutex<Lifecycle>,
    writer: AsyncMutex<Option<Arc<AsyncMutex<Writer>>>>,
    handlers: Arc<Handlers>,
    reconnect_attempts: AtomicU64,
    user_closed: AtomicBool,
    keep_reconnecting_after_close: AtomicBool,
    task: StdMutex<Option<JoinHandle<()>>>,
}

/// A single client WebSocket connection, automatically reconnecting unless
/// `reconnect_interval_ms` is `0`.
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Start connecting to `url` in the background and return immediately.
    /// Subscribe to `EventKind::Open`/`Error` before or after this call;
    /// handlers registered after the connection is already up still see
    /// every subsequent event.
    pub fn connect(url: impl Into<String>, config: WebSocketConfig) -> Self {
        let shared = Arc::new(Shared {
            url: url.into(),
            config,
            lifecycle: StdMutex::new(Lifecycle::Connecting),
            writer: AsyncMutex::new(None),
            handlers: Arc::new(Handlers::new()),
            reconnect_attempts: AtomicU64::new(0),
            user_closed: AtomicBool::new(false),
            keep_reconnecting_after_close: AtomicBool::new(false),
            task: StdMutex::new(None),
        });

        let handle = tokio::spawn(Self::drive(shared.clone()));
        *shared.task.lock().unwrap() = Some(handle);

        Connection { shared }
    }

    /// How many times the connection has redialed after the first attempt.
    /// Monotonic for the lifetime of this `Connection` — a later successful
    /// connect never resets it, so it's a meaningful liveness signal rather
    /// than a proxy for "currently reconnecting".
    pub fn reconnect_count(&self) -> u64 {
        self.shared.reconnect_attempts.load(Ordering::Relaxed)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.shared.lifecycle.lock().unwrap()
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.shared.handlers.on(kind, handler)
    }

    pub fn once<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.shared.handlers.once(kind, handler)
    }

    pub fn remove_listener(&self, id: SubscriptionId) {
        self.shared.handlers.remove_listener(id);
    }

    pub fn remove_all_listeners(&self, kind: Option<EventKind>) {
        self.shared.handlers.remove_all_listeners(kind);
    }

    /// Encode and enqueue `payload`. Returns `false` without sending
    /// anything if the connection isn't `Open` (§4.7).
    pub async fn send(&self, payload: Payload, raw: bool, replacer: Option<&[&str]>) -> bool {
        if *self.shared.lifecycle.lock().unwrap() != Lifecycle::Open {
            return false;
        }

        let (opcode, bytes) = match Self::encode_payload(payload, raw, replacer, &self.shared.config) {
            Ok(pair) => pair,
            Err(_) => return false,
        };

        self.write_message(opcode, bytes).await
    }

    fn encode_payload(
        payload: Payload,
        raw: bool,
        replacer: Option<&[&str]>,
        config: &WebSocketConfig,
    ) -> Result<(OpCode, Vec<u8>), Error> {
        match payload {
            Payload::Raw(bytes) => Ok((OpCode::Binary, bytes)),
            Payload::Binary(bytes) => Ok((OpCode::Binary, bytes)),
            Payload::Text(text) => Ok((OpCode::Text, text.into_bytes())),
            Payload::Json(value) => {
                if raw {
                    Ok((OpCode::Text, value.to_string().into_bytes()))
                } else {
                    let text = message::encode_text(&value, replacer, config)?;
                    Ok((OpCode::Text, text.into_bytes()))
                }
            }
        }
    }

    /// Send an (RFC-noncompliant, see §9) literal `PING` frame.
    pub async fn ping(&self) -> bool {
        if *self.shared.lifecycle.lock().unwrap() != Lifecycle::Open {
            return false;
        }
        let writer = self.shared.writer.lock().await.clone();
        match writer {
            Some(writer) => writer
                .lock()
                .await
                .write_frame(Frame::ping(b"PING".to_vec()))
                .await
                .is_ok(),
            None => false,
        }
    }

    async fn write_message(&self, opcode: OpCode, bytes: Vec<u8>) -> bool {
        let writer = self.shared.writer.lock().await.clone();
        match writer {
            Some(writer) => writer.lock().await.write_message(opcode, bytes).await.is_ok(),
            None => false,
        }
    }

    /// Close the connection. If called while still `Connecting`, aborts the
    /// in-flight handshake outright and only respawns the dial loop when
    /// `reason` is `KeepReconnecting` — see §9's open question on this.
    pub async fn close(&self, reason: CloseReason, code: u16) {
        self.shared.user_closed.store(true, Ordering::Relaxed);
        self.shared
            .keep_reconnecting_after_close
            .store(reason == CloseReason::KeepReconnecting, Ordering::Relaxed);

        let lifecycle = *self.shared.lifecycle.lock().unwrap();
        match lifecycle {
            Lifecycle::Connecting => {
                if let Some(handle) = self.shared.task.lock().unwrap().take() {
                    handle.abort();
                }
                if reason == CloseReason::KeepReconnecting {
                    self.shared.user_closed.store(false, Ordering::Relaxed);
                    *self.shared.lifecycle.lock().unwrap() = Lifecycle::Connecting;
                    let handle = tokio::spawn(Self::drive(self.shared.clone()));
                    *self.shared.task.lock().unwrap() = Some(handle);
                } else {
                    *self.shared.lifecycle.lock().unwrap() = Lifecycle::Closed;
                }
            }
            Lifecycle::Open | Lifecycle::Closing => {
                *self.shared.lifecycle.lock().unwrap() = Lifecycle::Closing;
                let writer = self.shared.writer.lock().await.clone();
                if let Some(writer) = writer {
                    let _ = writer.lock().await.write_close(code, "").await;
                }
            }
            Lifecycle::Closed => {}
        }
    }

    async fn drive(shared: Arc<Shared>) {
        loop {
            if shared.user_closed.load(Ordering::Relaxed) {
                *shared.lifecycle.lock().unwrap() = Lifecycle::Closed;
                return;
            }

            *shared.lifecycle.lock().unwrap() = Lifecycle::Connecting;

            match handshake::connect(&shared.url, &shared.config).await {
                Ok(result) => {
                    // Context takeover is the RFC 7692 default: absent an
                    // explicit `*_no_context_takeover` in the negotiated
                    // extension, the sliding window must carry across
                    // messages, so `reset_per_message` is only true when the
                    // peer actually asked for the opposite.
                    let deflate = result.extensions.as_ref().map(|extensions| {
                        Arc::new(Deflate::new(
                            extensions.client_no_context_takeover.unwrap_or(false),
                            extensions.client_max_window_bits,
                        ))
                    });
                    let inflate = result.extensions.as_ref().map(|extensions| {
                        Arc::new(Inflate::new(
                            extensions.server_no_context_takeover.unwrap_or(false),
                            extensions.server_max_window_bits,
                        ))
                    });

                    let writer = Arc::new(AsyncMutex::new(Writer::new(
                        result.writer,
                        shared.config.masking,
                        shared.config.max_frame_len,
                        deflate,
                    )));
                    *shared.writer.lock().await = Some(writer.clone());
                    *shared.lifecycle.lock().unwrap() = Lifecycle::Open;
                    shared.handlers.emit(&Event::Open);

                    let read_stream = ReadStream::new(
                        result.reader,
                        writer,
                        shared.config.clone(),
                        inflate,
                        shared.handlers.clone(),
                    );
                    let outcome = read_stream.run().await;
                    *shared.writer.lock().await = None;

                    if let Err(err) = outcome {
                        shared.handlers.emit(&Event::Error(Arc::new(err)));
                    }
                }
                Err(err) => {
                    shared.handlers.emit(&Event::Error(Arc::new(err)));
                }
            }

            let should_reconnect = shared.config.reconnect_interval_ms != 0
                && (!shared.user_closed.load(Ordering::Relaxed)
                    || shared.keep_reconnecting_after_close.load(Ordering::Relaxed));

            if !should_reconnect {
                *shared.lifecycle.lock().unwrap() = Lifecycle::Closed;
                return;
            }

            shared.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(Duration::from_millis(shared.config.reconnect_interval_ms)).await;
        }
    }
}
