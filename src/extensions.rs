//! `Sec-WebSocket-Extensions` negotiation for `permessage-deflate`.
//!
//! Only the client side is needed here: build the offer we send, then parse
//! whatever the server echoes back to decide if compression is actually on
//! for this connection.

const PERMESSAGE_DEFLATE: &str = "permessage-deflate";
const CLIENT_NO_CONTEXT_TAKEOVER: &str = "client_no_context_takeover";
const SERVER_NO_CONTEXT_TAKEOVER: &str = "server_no_context_takeover";
const CLIENT_MAX_WINDOW_BITS: &str = "client_max_window_bits";
const SERVER_MAX_WINDOW_BITS: &str = "server_max_window_bits";

/// The negotiated state of `permessage-deflate` for one connection.
///
/// Larger window sizes (closer to 15) compress better but cost more memory;
/// smaller ones (closer to 8) are faster and cheaper but compress worse.
/// Context takeover keeps the sliding window across messages, which helps
/// the ratio but means both peers must agree on whether it happens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions {
    pub permessage_deflate: bool,
    pub client_no_context_takeover: Option<bool>,
    pub server_no_context_takeover: Option<bool>,
    pub client_max_window_bits: Option<u8>,
    pub server_max_window_bits: Option<u8>,
}

impl Extensions {
    /// What we ask for when `compress` is enabled: plain `permessage-deflate`
    /// with no context-takeover or window-bits constraints, letting the
    /// server narrow them if it wants to.
    pub fn offer() -> Self {
        Self {
            permessage_deflate: true,
            ..Self::default()
        }
    }
}

/// Parse a `Sec-WebSocket-Extensions` response header value. Returns `None`
/// if the server didn't agree to `permessage-deflate` at all, since that's
/// the only case the caller needs to act on (fall back to uncompressed).
pub fn parse_extensions(extensions_header_value: &str) -> Option<Extensions> {
    let mut extensions = Extensions::default();

    for token in extensions_header_value.split(';') {
        let token = token.trim();
        if token == PERMESSAGE_DEFLATE {
            extensions.permessage_deflate = true;
        } else if token.starts_with(CLIENT_NO_CONTEXT_TAKEOVER) {
            extensions.client_no_context_takeover = Some(true);
        } else if token.starts_with(SERVER_NO_CONTEXT_TAKEOVER) {
            extensions.server_no_context_takeover = Some(true);
        } else if token.starts_with(CLIENT_MAX_WINDOW_BITS) {
            extensions.client_max_window_bits = match token.split_once('=') {
                Some((_, bits)) => bits.trim().parse::<u8>().ok(),
                None => Some(15),
            };
        } else if token.starts_with(SERVER_MAX_WINDOW_BITS) {
            extensions.server_max_window_bits = match token.split_once('=') {
                Some((_, bits)) => bits.trim().parse::<u8>().ok(),
                None => Some(15),
            };
        }
    }

    if !extensions.permessage_deflate {
        return None;
    }
    Some(extensions)
}

/// Append the `Sec-WebSocket-Extensions` header line (if any) to an
/// in-progress handshake request, including the request-terminating blank
/// line either way.
pub fn add_extension_headers(request: &mut String, extensions: Option<&Extensions>) {
    match extensions {
        Some(extensions) if extensions.permessage_deflate => {
            request.push_str(&format!("Sec-WebSocket-Extensions: {PERMESSAGE_DEFLATE}"));
            if let Some(true) = extensions.client_no_context_takeover {
                request.push_str(&format!("; {CLIENT_NO_CONTEXT_TAKEOVER}"));
            }
            if let Some(true) = extensions.server_no_context_takeover {
                request.push_str(&format!("; {SERVER_NO_CONTEXT_TAKEOVER}"));
            }
            if let Some(bits) = extensions.client_max_window_bits {
                request.push_str(&format!("; {CLIENT_MAX_WINDOW_BITS}={bits}"));
            }
            if let Some(bits) = extensions.server_max_window_bits {
                request.push_str(&format!("; {SERVER_MAX_WINDOW_BITS}={bits}"));
            }
            request.push_str("\r\n\r\n");
        }
        _ => request.push_str("\r\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_permessage_deflate() {
        let extensions = parse_extensions("permessage-deflate").unwrap();
        assert!(extensions.permessage_deflate);
        assert_eq!(extensions.client_max_window_bits, None);
    }

    #[test]
    fn parses_window_bits_and_context_takeover() {
        let extensions = parse_extensions(
            "permessage-deflate; client_no_context_takeover; client_max_window_bits=12",
        )
        .unwrap();
        assert_eq!(extensions.client_no_context_takeover, Some(true));
        assert_eq!(extensions.client_max_window_bits, Some(12));
    }

    #[test]
    fn returns_none_when_deflate_not_present() {
        assert!(parse_extensions("some-other-extension").is_none());
    }

    #[test]
    fn offer_header_round_trips_through_parse() {
        let mut request = String::new();
        add_extension_headers(&mut request, Some(&Extensions::offer()));
        let header_line = request.lines().next().unwrap();
        let value = header_line
            .strip_prefix("Sec-WebSocket-Extensions: ")
            .unwrap();
        assert!(parse_extensions(value).unwrap().permessage_deflate);
    }
}
