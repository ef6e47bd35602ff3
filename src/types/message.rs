//! Stored message and its payload encodings

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::GameId;

/// Sequence number assigned to the first message of every game
pub const FIRST_SEQ: u64 = 0;

/// One immutable entry in a game's log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub game: GameId,
    pub seq: u64,
    #[serde(with = "base64_payload")]
    pub payload: Vec<u8>,
    /// Unix milliseconds (UTC), assigned at append time
    pub timestamp: i64,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(game: GameId, seq: u64, payload: Vec<u8>) -> Self {
        Self {
            game,
            seq,
            payload,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Serialize to a single JSON line
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse from a JSON line
    pub fn from_json_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

/// How a payload is rendered in a JSON response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    Utf8,
    Base64,
}

impl PayloadEncoding {
    pub fn is_utf8(&self) -> bool {
        matches!(self, PayloadEncoding::Utf8)
    }
}

/// Render a payload as text, falling back to base64 for binary content
pub fn encode_payload(payload: &[u8]) -> (String, PayloadEncoding) {
    match std::str::from_utf8(payload) {
        Ok(text) => (text.to_string(), PayloadEncoding::Utf8),
        Err(_) => (STANDARD.encode(payload), PayloadEncoding::Base64),
    }
}

mod base64_payload {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payload: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(payload))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_line_stores_payload_as_base64() {
        let game = GameId::parse("chess").unwrap();
        let message = Message {
            game,
            seq: 3,
            payload: b"e2e4".to_vec(),
            timestamp: 1_700_000_000_000,
        };

        let line = message.to_json_line().unwrap();
        assert!(line.contains("\"payload\":\"ZTJlNA==\""));
        assert!(line.contains("\"game\":\"chess\""));

        let parsed = Message::from_json_line(&line).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn test_encode_payload_prefers_text() {
        let (text, encoding) = encode_payload("hello".as_bytes());
        assert_eq!(text, "hello");
        assert_eq!(encoding, PayloadEncoding::Utf8);
    }

    #[test]
    fn test_encode_payload_falls_back_to_base64() {
        let (text, encoding) = encode_payload(&[0xff, 0x00, 0xfe]);
        assert_eq!(text, "/wD+");
        assert_eq!(encoding, PayloadEncoding::Base64);
    }

    #[test]
    fn test_new_assigns_timestamp() {
        let message = Message::new(GameId::parse("go").unwrap(), FIRST_SEQ, Vec::new());
        assert!(message.timestamp > 0);
        assert!(message.payload.is_empty());
    }
}
