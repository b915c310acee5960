//! `permessage-deflate` (RFC 7692) compression contexts.
//!
//! flate2 exposes no async flush hook, so each direction wraps a plain
//! `Compress`/`Decompress` behind a [`tokio::sync::Mutex`]: the lock is the
//! single serialization slot the sliding-window state requires, and callers
//! simply await it instead of being handed a pending-queue to poll. `Inflate`
//! and `Deflate` are independent locks, since RFC 7692 keeps send-side and
//! receive-side context state separate even with `no_context_takeover`
//! disabled in both directions.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use tokio::sync::Mutex;

use crate::error::Error;

const DEFLATE_TRAILER: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

fn buffer_size_for(payload_len: usize) -> usize {
    if payload_len <= 4096 {
        4096
    } else if payload_len <= 65536 {
        16384
    } else {
        65536
    }
}

/// Decompresses inbound compressed messages.
pub struct Inflate {
    inner: Mutex<Decompress>,
    reset_per_message: bool,
}

impl Inflate {
    pub fn new(reset_per_message: bool, window_bits: Option<u8>) -> Self {
        let decompressor = match window_bits {
            Some(bits) => Decompress::new_with_window_bits(false, bits),
            None => Decompress::new(false),
        };
        Self {
            inner: Mutex::new(decompressor),
            reset_per_message,
        }
    }

    /// Inflate a complete, reassembled message payload. The caller must
    /// already have appended the `00 00 FF FF` trailer bytes, per RFC 7692
    /// §7.2.2 — we add them here so every call site gets it for free.
    pub async fn inflate(&self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        let mut input = Vec::with_capacity(payload.len() + DEFLATE_TRAILER.len());
        input.extend_from_slice(payload);
        input.extend_from_slice(&DEFLATE_TRAILER);

        let mut decompressor = self.inner.lock().await;
        if self.reset_per_message {
            decompressor.reset(false);
        }

        let buffer_size = buffer_size_for(input.len());
        let mut output = Vec::with_capacity(buffer_size);
        let mut chunk = Vec::with_capacity(buffer_size);

        let before_in = decompressor.total_in();
        while decompressor.total_in() - before_in < input.len() as u64 {
            let consumed = (decompressor.total_in() - before_in) as usize;
            let remaining = &input[consumed..];
            match decompressor
                .decompress_vec(remaining, &mut chunk, FlushDecompress::Sync)
                .map_err(|e| Error::CompressionError(e.to_string()))?
            {
                Status::Ok => {
                    output.extend_from_slice(&chunk);
                    chunk.clear();
                }
                Status::StreamEnd => {
                    output.extend_from_slice(&chunk);
                    break;
                }
                Status::BufError => break,
            }
        }

        Ok(output)
    }
}

/// Compresses outbound messages.
pub struct Deflate {
    inner: Mutex<Compress>,
    reset_per_message: bool,
}

impl Deflate {
    pub fn new(reset_per_message: bool, window_bits: Option<u8>) -> Self {
        let compressor = Compress::new_with_window_bits(
            Compression::default(),
            false,
            window_bits.unwrap_or(15),
        );
        Self {
            inner: Mutex::new(compressor),
            reset_per_message,
        }
    }

    /// Compress a complete message payload and strip the trailing
    /// `00 00 FF FF` bytes flate2 appends on `Sync` flush, per RFC 7692
    /// §7.2.1 — the wire form never carries them, each peer re-derives them
    /// on inflate.
    pub async fn deflate(&self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        let mut compressor = self.inner.lock().await;
        if self.reset_per_message {
            compressor.reset();
        }

        let buffer_size = buffer_size_for(payload.len());
        let mut output = Vec::with_capacity(buffer_size);
        let mut chunk = vec![0u8; buffer_size];
        let mut offset = 0usize;

        loop {
            let input = &payload[offset..];
            let flush = if offset == payload.len() {
                FlushCompress::Finish
            } else {
                FlushCompress::Sync
            };

            let before_out = compressor.total_out();
            let before_in = compressor.total_in();
            let status = compressor
                .compress(input, &mut chunk, flush)
                .map_err(|e| Error::CompressionError(e.to_string()))?;

            let written = (compressor.total_out() - before_out) as usize;
            output.extend_from_slice(&chunk[..written]);
            offset += (compressor.total_in() - before_in) as usize;

            if status == Status::StreamEnd || (offset >= payload.len() && written == 0) {
                break;
            }
            if offset >= payload.len() && flush == FlushCompress::Finish {
                break;
            }
        }

        if output.ends_with(&DEFLATE_TRAILER) {
            output.truncate(output.len() - DEFLATE_TRAILER.len());
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_deflate_then_inflate() {
        let deflate = Deflate::new(true, None);
        let inflate = Inflate::new(true, None);

        let message = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let compressed = deflate.deflate(&message).await.unwrap();
        assert!(compressed.len() < message.len());

        let decompressed = inflate.inflate(&compressed).await.unwrap();
        assert_eq!(decompressed, message);
    }

    #[tokio::test]
    async fn context_takeover_across_multiple_messages() {
        let deflate = Deflate::new(false, None);
        let inflate = Inflate::new(false, None);

        for i in 0..5 {
            let message = format!("message number {i} repeated repeated repeated").into_bytes();
            let compressed = deflate.deflate(&message).await.unwrap();
            let decompressed = inflate.inflate(&compressed).await.unwrap();
            assert_eq!(decompressed, message);
        }
    }

    #[tokio::test]
    async fn empty_payload_round_trips() {
        let deflate = Deflate::new(true, None);
        let inflate = Inflate::new(true, None);

        let compressed = deflate.deflate(&[]).await.unwrap();
        let decompressed = inflate.inflate(&compressed).await.unwrap();
        assert_eq!(decompressed, Vec::<u8>::new());
    }
}
