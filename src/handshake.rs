//! Client-side opening handshake (RFC 6455 §4.1/§4.2).
//!
//! Builds the `GET` upgrade request, sends it over a freshly connected
//! socket, and parses the server's response far enough to validate
//! `Sec-WebSocket-Accept` and discover whether `permessage-deflate` was
//! actually negotiated.

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use rand::random;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::time::{timeout, Duration};
use url::Url;

use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::extensions::{add_extension_headers, parse_extensions, Extensions};
use crate::stream::{self, ClientStream};

const ACCEPT_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HandshakeResult {
    pub reader: BufReader<tokio::io::ReadHalf<ClientStream>>,
    pub writer: tokio::io::WriteHalf<ClientStream>,
    pub extensions: Option<Extensions>,
    /// Whatever the server echoed back in `Sec-WebSocket-Protocol`. The
    /// client never picks among several offered tokens (§1 Non-goals); this
    /// is purely informational for the caller.
    pub protocol: Option<String>,
}

fn generate_websocket_key() -> String {
    let random_bytes: [u8; 16] = random();
    BASE64_STANDARD.encode(random_bytes)
}

fn generate_websocket_accept_value(key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(ACCEPT_GUID.as_bytes());
    BASE64_STANDARD.encode(sha1.finalize())
}

/// Split a `ws(s)://` URL into the pieces the request and the socket need:
/// the request line + headers, the `host:port` to dial, the bare host for
/// TLS server-name validation, and whether TLS is required.
///
/// Beyond the mandatory handshake headers (§4.1), also folds in the
/// optional `Sec-WebSocket-Protocol`, `Origin`, `Cookie`, and arbitrary
/// extra headers the caller configured. Cookies are joined as `name=value`
/// pairs separated by `, ` into a single header, matching the source's
/// observed behavior rather than RFC 6265's `; ` separator.
fn construct_http_request(
    ws_url: &str,
    key: &str,
    extensions: Option<&Extensions>,
    config: &WebSocketConfig,
) -> Result<(String, String, String, bool), Error> {
    let parsed_url = Url::parse(ws_url)?;
    let mut use_tls = false;

    let http_port: u16 = match parsed_url.scheme() {
        "ws" => 80,
        "wss" => {
            use_tls = true;
            443
        }
        _ => return Err(Error::InvalidSchemeURL),
    };

    let host = parsed_url.host_str().ok_or(Error::URLNoHost)?;
    let port = parsed_url.port().unwrap_or(http_port);

    let request_host_field = match parsed_url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let host_with_port = format!("{host}:{port}");

    let request_path = match parsed_url.query() {
        Some(query) => format!("{}?{}", parsed_url.path(), query),
        None => parsed_url.path().to_string(),
    };

    let mut request = format!(
        "GET {request_path} HTTP/1.1\r\nHost: {request_host_field}\r\nConnection: Upgrade\r\nUpgrade: websocket\r\nSec-WebSocket-Key: {key}\r\nSec-WebSocket-Version: 13\r\n",
    );

    if let Some(subprotocol) = &config.subprotocol {
        request.push_str(&format!("Sec-WebSocket-Protocol: {subprotocol}\r\n"));
    }
    if let Some(origin) = &config.origin {
        request.push_str(&format!("Origin: {origin}\r\n"));
    }
    for (name, value) in &config.extra_headers {
        request.push_str(&format!("{name}: {value}\r\n"));
    }
    if !config.cookies.is_empty() {
        let cookie_header = config
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        request.push_str(&format!("Cookie: {cookie_header}\r\n"));
    }

    add_extension_headers(&mut request, extensions);

    Ok((request, host_with_port, host.to_string(), use_tls))
}

/// Read from `reader` until a full HTTP response head (`\r\n\r\n`) has
/// arrived, then hand it to `httparse`. Mirrors the teacher's
/// `parse_http_request`, but for the response side.
async fn read_http_response<S: tokio::io::AsyncRead + Unpin>(
    reader: &mut BufReader<S>,
) -> Result<(u16, Vec<(String, String)>), Error> {
    let mut raw = Vec::new();
    let mut byte = [0u8; 1];

    timeout(HANDSHAKE_TIMEOUT, async {
        loop {
            reader.read_exact(&mut byte).await?;
            raw.push(byte[0]);
            if raw.len() >= 4 && &raw[raw.len() - 4..] == b"\r\n\r\n" {
                break;
            }
        }
        Ok::<(), Error>(())
    })
    .await??;

    let mut headers_buf = [httparse::EMPTY_HEADER; 32];
    let mut response = httparse::Response::new(&mut headers_buf);
    let status = match response.parse(&raw)? {
        httparse::Status::Complete(_) => response.code.ok_or(Error::IncompleteHTTPResponse)?,
        httparse::Status::Partial => return Err(Error::IncompleteHTTPResponse),
    };

    let headers = response
        .headers
        .iter()
        .map(|h| {
            (
                h.name.to_ascii_lowercase(),
                String::from_utf8_lossy(h.value).trim().to_string(),
            )
        })
        .collect();

    Ok((status, headers))
}

/// Perform the full client handshake against `url` and return the split
/// socket halves plus whatever extensions were actually negotiated.
pub async fn connect(url: &str, config: &WebSocketConfig) -> Result<HandshakeResult, Error> {
    let offered_extensions = config.compress.then(Extensions::offer);
    let key = generate_websocket_key();

    let (request, host_with_port, host, use_tls) =
        construct_http_request(url, &key, offered_extensions.as_ref(), config)?;

    if (config.tls_cert.is_some() || config.tls_key.is_some()) && !use_tls {
        return Err(Error::SchemeAgainstTlsConfig(use_tls, url.to_string()));
    }

    let socket = match &config.unix_socket_path {
        Some(path) => stream::connect_unix(path).await?,
        None => stream::connect(&host_with_port, &host, use_tls, config).await?,
    };
    let (read_half, mut write_half) = tokio::io::split(socket);
    let mut reader = BufReader::new(read_half);

    write_half.write_all(request.as_bytes()).await?;
    write_half.flush().await?;

    let (status, headers) = read_http_response(&mut reader).await?;
    if status != 101 {
        return Err(Error::UnexpectedResponse(status));
    }

    let accept = headers
        .iter()
        .find(|(name, _)| name == "sec-websocket-accept")
        .map(|(_, value)| value.as_str());
    let expected_accept = generate_websocket_accept_value(&key);
    if accept != Some(expected_accept.as_str()) {
        return Err(Error::InvalidServerKey);
    }

    let negotiated_extensions = headers
        .iter()
        .find(|(name, _)| name == "sec-websocket-extensions")
        .and_then(|(_, value)| parse_extensions(value));

    let protocol = headers
        .iter()
        .find(|(name, _)| name == "sec-websocket-protocol")
        .map(|(_, value)| value.clone());

    Ok(HandshakeResult {
        reader,
        writer: write_half,
        extensions: negotiated_extensions,
        protocol,
    })
}
