//! The decoded-payload surface a consumer sees, and the two pipelines that
//! get it there: inbound decode (§4.6) and outbound encode (§4.7).

use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};

use crate::config::{PayloadKind, WebSocketConfig};
use crate::error::Error;
use crate::frame::{Frame, OpCode};

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
    Json(serde_json::Value),
}

impl Message {
    pub fn as_binary(&self) -> Vec<u8> {
        match self {
            Message::Text(text) => text.as_bytes().to_vec(),
            Message::Binary(data) => data.clone(),
            Message::Json(value) => value.to_string().into_bytes(),
        }
    }

    pub fn as_text(&self) -> Result<String, Error> {
        match self {
            Message::Text(text) => Ok(text.clone()),
            Message::Binary(data) => Ok(String::from_utf8(data.clone())?),
            Message::Json(value) => Ok(value.to_string()),
        }
    }
}

/// Decode a reassembled, already-inflated message payload into a
/// [`Message`]. Returns `Ok(None)` for the one case the pipeline is allowed
/// to silently drop: a `json`-mode payload that isn't valid JSON (§4.6,
/// §9 "$decode precheck").
pub fn decode(
    opcode: OpCode,
    payload: Vec<u8>,
    config: &WebSocketConfig,
) -> Result<Option<Message>, Error> {
    match opcode {
        OpCode::Binary => Ok(Some(Message::Binary(payload))),
        OpCode::Text => {
            let mut text = String::from_utf8(payload)?;

            if config.encode_decode {
                text = match percent_decode_str(&text).decode_utf8() {
                    Ok(decoded) => decoded.into_owned(),
                    Err(_) => text,
                };
            }

            if let Some(cipher) = &config.cipher {
                text = match cipher.decrypt(&text) {
                    Ok(plain) => plain,
                    Err(err) => {
                        log::debug!("payload decrypt failed, delivering raw text: {err}");
                        text
                    }
                };
            }

            if config.payload_kind == PayloadKind::Json {
                match serde_json::from_str::<serde_json::Value>(&text) {
                    Ok(value) => Ok(Some(Message::Json(value))),
                    Err(err) => {
                        log::debug!("dropping malformed JSON payload: {err}");
                        Ok(None)
                    }
                }
            } else {
                Ok(Some(Message::Text(text)))
            }
        }
        other => Err(Error::UnexpectedOpcode(other)),
    }
}

/// Encode an outbound JSON/text payload per §4.7: stringify (with an
/// optional `replacer` field allowlist, mirroring `JSON.stringify`'s second
/// argument), then encrypt, then URI-encode.
pub fn encode_text(
    value: &serde_json::Value,
    replacer: Option<&[&str]>,
    config: &WebSocketConfig,
) -> Result<String, Error> {
    let filtered = match replacer {
        Some(keys) => filter_object_keys(value, keys),
        None => value.clone(),
    };
    let mut text = match &filtered {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    if let Some(cipher) = &config.cipher {
        text = cipher.encrypt(&text)?;
    }
    if config.encode_decode {
        text = utf8_percent_encode(&text, NON_ALPHANUMERIC).to_string();
    }

    Ok(text)
}

fn filter_object_keys(value: &serde_json::Value, keys: &[&str]) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for key in keys {
                if let Some(v) = map.get(*key) {
                    out.insert((*key).to_string(), v.clone());
                }
            }
            serde_json::Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Split `payload` into frames no larger than `max_frame_len` bytes.
/// Mirrors the teacher's `Message::to_frames`: an empty payload still
/// produces exactly one (final) frame, and every non-final frame after the
/// first carries `OpCode::Continue`.
pub fn to_frames(
    opcode: OpCode,
    payload: Vec<u8>,
    max_frame_len: usize,
    compressed: bool,
) -> Vec<Frame> {
    if payload.is_empty() {
        return vec![Frame::new(true, opcode, payload, compressed)];
    }

    let chunk_size = if max_frame_len == 0 {
        payload.len()
    } else {
        max_frame_len
    };

    let mut frames = Vec::new();
    for chunk in payload.chunks(chunk_size) {
        let frame_opcode = if frames.is_empty() {
            opcode
        } else {
            OpCode::Continue
        };
        frames.push(Frame::new(false, frame_opcode, chunk.to_vec(), false));
    }
    if let Some(first) = frames.first_mut() {
        first.compressed = compressed;
    }
    if let Some(last) = frames.last_mut() {
        last.final_fragment = true;
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::PayloadCipher;

    struct UppercaseCipher;
    impl PayloadCipher for UppercaseCipher {
        fn encrypt(&self, plaintext: &str) -> Result<String, Error> {
            Ok(plaintext.to_uppercase())
        }
        fn decrypt(&self, ciphertext: &str) -> Result<String, Error> {
            Ok(ciphertext.to_lowercase())
        }
    }

    #[test]
    fn decodes_plain_text_frame() {
        let config = WebSocketConfig::new();
        let decoded = decode(OpCode::Text, b"hello".to_vec(), &config)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, Message::Text("hello".to_string()));
    }

    #[test]
    fn json_mode_parses_valid_json() {
        let mut config = WebSocketConfig::new();
        config.payload_kind = PayloadKind::Json;
        let decoded = decode(OpCode::Text, br#"{"a":1}"#.to_vec(), &config)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, Message::Json(serde_json::json!({"a": 1})));
    }

    #[test]
    fn json_mode_silently_drops_malformed_payload() {
        let mut config = WebSocketConfig::new();
        config.payload_kind = PayloadKind::Json;
        let decoded = decode(OpCode::Text, b"not json".to_vec(), &config).unwrap();
        assert_eq!(decoded, None);
    }

    #[test]
    fn uri_decode_failure_delivers_raw_text() {
        let mut config = WebSocketConfig::new();
        config.encode_decode = true;
        let decoded = decode(OpCode::Text, b"hello%world".to_vec(), &config)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, Message::Text("hello%world".to_string()));
    }

    #[test]
    fn cipher_decrypts_inbound_text() {
        let mut config = WebSocketConfig::new();
        config.cipher = Some(std::sync::Arc::new(UppercaseCipher));
        let decoded = decode(OpCode::Text, b"HELLO".to_vec(), &config)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, Message::Text("hello".to_string()));
    }

    #[test]
    fn empty_payload_produces_single_final_frame() {
        let frames = to_frames(OpCode::Text, Vec::new(), 10, false);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].final_fragment);
    }

    #[test]
    fn large_payload_is_split_with_continue_opcodes() {
        let frames = to_frames(OpCode::Binary, vec![0u8; 25], 10, false);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].opcode, OpCode::Binary);
        assert_eq!(frames[1].opcode, OpCode::Continue);
        assert_eq!(frames[2].opcode, OpCode::Continue);
        assert!(!frames[0].final_fragment);
        assert!(frames[2].final_fragment);
    }

    #[test]
    fn replacer_keeps_only_allowlisted_keys() {
        let config = WebSocketConfig::new();
        let value = serde_json::json!({"keep": 1, "drop": 2});
        let text = encode_text(&value, Some(&["keep"]), &config).unwrap();
        let reparsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed, serde_json::json!({"keep": 1}));
    }
}
