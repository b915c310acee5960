//! A single WebSocket frame: header, extended length, mask, payload.
//!
//! `encode` is the outbound half of the frame codec (§4.2); the inbound half
//! lives in [`crate::parser`], since decoding a frame off an arbitrary TCP
//! stream needs to track how many bytes have arrived so far, which a pure
//! function over a complete buffer can't express.

use crate::error::Error;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Continue,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    pub fn from_byte(byte: u8) -> Result<Self, Error> {
        match byte {
            0x0 => Ok(OpCode::Continue),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(Error::InvalidOpcode(other)),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            OpCode::Continue => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

/// A single already-reassembled (or still-fragmented) WebSocket frame.
///
/// `compressed` mirrors RSV1 on the wire: for outbound frames it tells the
/// encoder to set the bit, for inbound frames the parser sets it to reflect
/// what it read. It only ever applies to the first frame of a fragmented
/// message, per RFC 7692 §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub final_fragment: bool,
    pub opcode: OpCode,
    pub payload: Vec<u8>,
    pub compressed: bool,
}

impl Frame {
    pub fn new(final_fragment: bool, opcode: OpCode, payload: Vec<u8>, compressed: bool) -> Self {
        Self {
            final_fragment,
            opcode,
            payload,
            compressed,
        }
    }

    pub fn text(payload: Vec<u8>) -> Self {
        Self::new(true, OpCode::Text, payload, false)
    }

    pub fn binary(payload: Vec<u8>) -> Self {
        Self::new(true, OpCode::Binary, payload, false)
    }

    pub fn close(code: u16, reason: &str) -> Self {
        let mut payload = Vec::with_capacity(2 + reason.len());
        payload.extend_from_slice(&code.to_be_bytes());
        payload.extend_from_slice(reason.as_bytes());
        Self::new(true, OpCode::Close, payload, false)
    }

    pub fn ping(payload: Vec<u8>) -> Self {
        Self::new(true, OpCode::Ping, payload, false)
    }

    pub fn pong(payload: Vec<u8>) -> Self {
        Self::new(true, OpCode::Pong, payload, false)
    }
}

/// Encode `frame` to its wire representation.
///
/// `mask` mirrors [`crate::config::WebSocketConfig::masking`]: RFC 6455
/// requires it for client-originated frames, it only exists as a knob so
/// test harnesses can talk to permissive test servers. Control frames are
/// asserted to carry a payload of at most 125 bytes and `final_fragment =
/// true`, per §4.2 — callers (the writer, the fragmenter) are responsible
/// for upholding that before reaching here.
pub fn encode(frame: &Frame, mask: bool) -> Vec<u8> {
    debug_assert!(
        !frame.opcode.is_control() || (frame.payload.len() <= 125 && frame.final_fragment),
        "control frames must be unfragmented and <= 125 bytes"
    );

    let payload_len = frame.payload.len();
    let mut out = Vec::with_capacity(payload_len + 14);

    let mut first_byte = (frame.final_fragment as u8) << 7 | frame.opcode.as_u8();
    if frame.compressed {
        first_byte |= 0x40; // RSV1
    }
    out.push(first_byte);

    let mask_bit = if mask { 0x80 } else { 0x00 };
    if payload_len <= 125 {
        out.push(mask_bit | payload_len as u8);
    } else if payload_len <= 65535 {
        out.push(mask_bit | 126);
        out.extend_from_slice(&(payload_len as u16).to_be_bytes());
    } else {
        out.push(mask_bit | 127);
        out.extend_from_slice(&(payload_len as u64).to_be_bytes());
    }

    if mask {
        let key: [u8; 4] = rand::thread_rng().gen();
        out.extend_from_slice(&key);
        out.extend(
            frame
                .payload
                .iter()
                .enumerate()
                .map(|(i, byte)| byte ^ key[i % 4]),
        );
    } else {
        out.extend_from_slice(&frame.payload);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    #[test]
    fn opcode_roundtrips_through_its_byte() {
        for byte in [0x0u8, 0x1, 0x2, 0x8, 0x9, 0xA] {
            let opcode = OpCode::from_byte(byte).unwrap();
            assert_eq!(opcode.as_u8(), byte);
        }
        assert!(matches!(OpCode::from_byte(0x3), Err(Error::InvalidOpcode(0x3))));
    }

    #[test]
    fn control_opcodes_are_flagged_as_control() {
        assert!(OpCode::Close.is_control());
        assert!(OpCode::Ping.is_control());
        assert!(OpCode::Pong.is_control());
        assert!(!OpCode::Text.is_control());
        assert!(!OpCode::Binary.is_control());
        assert!(!OpCode::Continue.is_control());
    }

    #[test]
    fn unmasked_round_trip_for_various_lengths() {
        for len in [0usize, 1, 125, 126, 127, 65535, 65536, 1_000_000] {
            let payload = vec![b'a'; len];
            let frame = Frame::text(payload.clone());
            let bytes = encode(&frame, false);

            let mut parser = Parser::new(0);
            parser.push(&bytes);
            let decoded = parser.next_frame().unwrap().expect("frame available");
            assert_eq!(decoded.opcode, OpCode::Text);
            assert_eq!(decoded.payload, payload);
            assert!(decoded.final_fragment);
        }
    }

    #[test]
    fn masked_round_trip() {
        let payload = b"hello masked world".to_vec();
        let frame = Frame::binary(payload.clone());
        let bytes = encode(&frame, true);

        // masked frames must have the MSB of byte 1 set
        assert_ne!(bytes[1] & 0x80, 0);

        let mut parser = Parser::new(0);
        parser.push(&bytes);
        let decoded = parser.next_frame().unwrap().expect("frame available");
        assert_eq!(decoded.payload, payload);
    }
}
