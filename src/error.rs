use crate::frame::OpCode;
use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;
use tokio::time::error::Elapsed;
use url::ParseError;

/// Everything that can go wrong between `connect` and the connection being
/// torn down. Every fallible path in this crate returns one of these
/// variants instead of panicking.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {source}")]
    IOError {
        #[from]
        source: io::Error,
    },

    #[error("{source}")]
    Timeout {
        #[from]
        source: Elapsed,
    },

    #[error("{source}")]
    FromUtf8Error {
        #[from]
        source: FromUtf8Error,
    },

    #[error("channel communication error")]
    CommunicationError,

    // Handshake / HTTP errors
    #[error("{source}")]
    URLParseError {
        #[from]
        source: ParseError,
    },

    #[error("invalid scheme in WebSocket URL, expected ws:// or wss://")]
    InvalidSchemeURL,

    #[error("URL has no host")]
    URLNoHost,

    #[error("{source}")]
    HttpParseError {
        #[from]
        source: httparse::Error,
    },

    #[error("incomplete HTTP response")]
    IncompleteHTTPResponse,

    #[error("server did not switch protocols, got HTTP status {0}")]
    UnexpectedResponse(u16),

    #[error("server did not send a valid Sec-WebSocket-Accept key")]
    InvalidServerKey,

    #[error("{source}")]
    DomainError {
        #[from]
        source: pki_types::InvalidDnsNameError,
    },

    #[error("TLS error: {source}")]
    RustlsError {
        #[from]
        source: tokio_rustls::rustls::Error,
    },

    #[error("reject_unauthorized = `{0}` does not match the passed URL scheme: `{1}`")]
    SchemeAgainstTlsConfig(bool, String),

    #[error("TLS configuration error: {0}")]
    TlsConfigError(String),

    // Framing errors
    #[error("RSV bit set without a matching negotiated extension")]
    RSVNotZero,

    #[error("control frames must not be fragmented")]
    ControlFramesFragmented,

    #[error("control frame payload can't be greater than 125 bytes")]
    ControlFramePayloadSize,

    #[error("fragment_size `{0}` can't be greater than max_frame_len `{1}`")]
    CustomFragmentSizeExceeded(usize, usize),

    #[error("frame is too large")]
    FrameTooLarge,

    #[error("message is too large")]
    MessageTooLarge,

    #[error("invalid opcode: {0}")]
    InvalidOpcode(u8),

    #[error("unexpected opcode `{0:?}` for the current parser state")]
    UnexpectedOpcode(OpCode),

    // Fragmentation errors
    #[error("invalid frame while a fragmented message is in progress")]
    InvalidFrameFragmentation,

    #[error("incoming fragmented message but one is already in progress")]
    FragmentedInProgress,

    #[error("invalid continuation frame: no fragmented message to continue")]
    InvalidContinuationFrame,

    // Compression errors
    #[error("max_window_bits should be a value between 8 and 15")]
    InvalidMaxWindowBits,

    #[error("deflate error: {0}")]
    CompressionError(String),

    // Lifecycle errors
    #[error("connection is not open")]
    NotOpen,

    #[error("connection was closed locally")]
    ClosedByUser,
}

impl Error {
    /// The WebSocket close status code this error should be reported with,
    /// per the error taxonomy. Not every error maps to a wire close code;
    /// those return `None` and are only ever surfaced as an `Error` event.
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Error::FrameTooLarge | Error::MessageTooLarge => Some(1009),
            Error::RSVNotZero
            | Error::ControlFramesFragmented
            | Error::ControlFramePayloadSize
            | Error::InvalidFrameFragmentation
            | Error::FragmentedInProgress
            | Error::InvalidContinuationFrame
            | Error::InvalidOpcode(_)
            | Error::UnexpectedOpcode(_) => Some(1002),
            _ => None,
        }
    }
}
