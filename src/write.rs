//! Drives outbound frames onto the socket: optionally deflates a message,
//! fragments it to `max_frame_len`, then writes each frame with
//! [`crate::frame::encode`]. Mirrors the teacher's `Writer`, but there is
//! only ever a client side here, so the `WriterKind` split is gone.

use std::sync::Arc;

use tokio::io::{AsyncWriteExt, WriteHalf};

use crate::compression::Deflate;
use crate::error::Error;
use crate::frame::{self, Frame, OpCode};
use crate::message;
use crate::stream::ClientStream;

pub struct Writer {
    write_half: WriteHalf<ClientStream>,
    masking: bool,
    max_frame_len: usize,
    deflate: Option<Arc<Deflate>>,
}

impl Writer {
    pub fn new(
        write_half: WriteHalf<ClientStream>,
        masking: bool,
        max_frame_len: usize,
        deflate: Option<Arc<Deflate>>,
    ) -> Self {
        Self {
            write_half,
            masking,
            max_frame_len,
            deflate,
        }
    }

    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), Error> {
        let bytes = frame::encode(&frame, self.masking);
        self.write_half.write_all(&bytes).await?;
        self.write_half.flush().await?;
        Ok(())
    }

    /// Write a complete text/binary message, compressing it first when a
    /// deflate context was negotiated.
    pub async fn write_message(&mut self, opcode: OpCode, payload: Vec<u8>) -> Result<(), Error> {
        let (payload, compressed) = match &self.deflate {
            Some(deflate) => (deflate.deflate(&payload).await?, true),
            None => (payload, false),
        };

        for frame in message::to_frames(opcode, payload, self.max_frame_len, compressed) {
            self.write_frame(frame).await?;
        }
        Ok(())
    }

    pub async fn write_ping(&mut self, payload: Vec<u8>) -> Result<(), Error> {
        self.write_frame(Frame::ping(payload)).await
    }

    pub async fn write_pong(&mut self, payload: Vec<u8>) -> Result<(), Error> {
        self.write_frame(Frame::pong(payload)).await
    }

    pub async fn write_close(&mut self, code: u16, reason: &str) -> Result<(), Error> {
        self.write_frame(Frame::close(code, reason)).await
    }
}
