//! A client-side implementation of the [WebSocket Protocol RFC
//! 6455](https://datatracker.ietf.org/doc/html/rfc6455), with
//! `permessage-deflate` ([RFC 7692](https://datatracker.ietf.org/doc/html/rfc7692))
//! negotiation, automatic reconnect, and text/binary/JSON payload modes.
//!
//! It's built on tokio: [`Connection::connect`](connection::Connection::connect)
//! dials a `ws://`/`wss://` URL, performs the opening handshake, and hands
//! back a handle whose `send`/`ping`/`close` calls and `on`/`once` event
//! subscriptions drive a background task doing the framing, masking,
//! compression and reassembly.

pub mod cipher;
pub mod compression;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod extensions;
pub mod frame;
pub mod handshake;
pub mod message;
mod parser;
mod read;
pub mod stream;
mod write;

pub use cipher::PayloadCipher;
pub use config::{PayloadKind, WebSocketConfig};
pub use connection::{CloseReason, Connection, Lifecycle, Payload};
pub use error::Error;
pub use event::{Event, EventKind, SubscriptionId};
pub use message::Message;
