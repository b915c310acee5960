use crate::cipher::PayloadCipher;
use std::sync::Arc;

/// The wire representation a consumer wants [`crate::message::Message`]
/// values decoded into, and outgoing `send()` calls encoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadKind {
    /// UTF-8 text frames, delivered as `String`.
    #[default]
    Text,
    /// Binary frames, delivered as `Vec<u8>`.
    Binary,
    /// Same wire representation as `Binary`, kept as a distinct variant so
    /// callers that asked for `buffer` semantics (no UTF-8 assumptions
    /// anywhere in the pipeline) are visibly different from ones that asked
    /// for `binary`.
    Buffer,
    /// Text frames that are additionally required to be valid JSON; see
    /// §4.6 for the precheck/drop semantics.
    Json,
}

/// Immutable, per-connection configuration. Cloned into every reconnect
/// generation; nothing here may be mutated once `connect` has been called.
#[derive(Clone)]
pub struct WebSocketConfig {
    /// Payload mode data is decoded into / encoded from.
    pub payload_kind: PayloadKind,
    /// Whether outbound frames are masked. RFC 6455 requires client frames
    /// to be masked; this only exists to let test harnesses talk to a
    /// strict, non-masking test server.
    pub masking: bool,
    /// Request `permessage-deflate` during the handshake.
    pub compress: bool,
    /// Delay before a reconnect attempt, in milliseconds. `0` disables
    /// automatic reconnection entirely.
    pub reconnect_interval_ms: u64,
    /// URI-encode outbound text payloads / URI-decode inbound ones.
    pub encode_decode: bool,
    /// Optional symmetric payload cipher, applied to text payloads after
    /// JSON/URI encoding on the way out and before JSON/URI decoding on the
    /// way in.
    pub cipher: Option<Arc<dyn PayloadCipher>>,
    /// Verify the peer's TLS certificate. Only meaningful for `wss://` URLs.
    pub reject_unauthorized: bool,
    /// PEM-encoded client private key, for mutual TLS.
    pub tls_key: Option<String>,
    /// PEM-encoded client certificate chain, for mutual TLS.
    pub tls_cert: Option<String>,
    /// PEM-encoded Diffie-Hellman parameters.
    pub tls_dhparam: Option<String>,
    /// PEM-encoded CA bundle to trust in addition to the platform roots.
    pub ca_file: Option<String>,
    /// Maximum accepted frame (and inflated message) length in bytes.
    /// `0` means unbounded.
    pub max_frame_len: usize,
    /// `Sec-WebSocket-Protocol` token to request. The client only echoes
    /// what the server sends back (§1 Non-goals: no real subprotocol
    /// negotiation), so this is read-only from the caller's perspective.
    pub subprotocol: Option<String>,
    /// `Origin` / `Sec-WebSocket-Origin` header value.
    pub origin: Option<String>,
    /// Arbitrary extra request headers, sent verbatim in handshake order.
    pub extra_headers: Vec<(String, String)>,
    /// Cookie `name=value` pairs, joined with `, ` into a single `Cookie`
    /// header per §4.1.
    pub cookies: Vec<(String, String)>,
    /// Connect over a UNIX domain socket instead of TCP/TLS. When set, the
    /// URL's host/port are only used for the `Host` request header.
    pub unix_socket_path: Option<String>,
}

impl std::fmt::Debug for WebSocketConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketConfig")
            .field("payload_kind", &self.payload_kind)
            .field("masking", &self.masking)
            .field("compress", &self.compress)
            .field("reconnect_interval_ms", &self.reconnect_interval_ms)
            .field("encode_decode", &self.encode_decode)
            .field("cipher", &self.cipher.is_some())
            .field("reject_unauthorized", &self.reject_unauthorized)
            .field("max_frame_len", &self.max_frame_len)
            .field("subprotocol", &self.subprotocol)
            .field("origin", &self.origin)
            .field("extra_headers", &self.extra_headers.len())
            .field("cookies", &self.cookies.len())
            .field("unix_socket_path", &self.unix_socket_path)
            .finish()
    }
}

impl WebSocketConfig {
    pub fn new() -> Self {
        Self {
            payload_kind: PayloadKind::Text,
            masking: true,
            compress: true,
            reconnect_interval_ms: 0,
            encode_decode: false,
            cipher: None,
            reject_unauthorized: true,
            tls_key: None,
            tls_cert: None,
            tls_dhparam: None,
            ca_file: None,
            max_frame_len: 64 << 20,
            subprotocol: None,
            origin: None,
            extra_headers: Vec::new(),
            cookies: Vec::new(),
            unix_socket_path: None,
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self::new()
    }
}
