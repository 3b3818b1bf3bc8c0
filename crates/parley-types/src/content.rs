//! Conversation content types: roles, parts, and messages.
//!
//! A `Message` is one turn of a conversation: a role plus an ordered list
//! of parts. Parts interleave text and inline binary data in presentation
//! order, and that order is significant.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Model => write!(f, "model"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "model" => Ok(Role::Model),
            other => Err(format!("invalid role: '{other}'")),
        }
    }
}

/// Inline binary content carried within a message part.
///
/// The payload is base64-encoded, matching the wire and persisted layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineData {
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

impl InlineData {
    /// Encode raw bytes into an inline-data payload.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: BASE64.encode(bytes),
        }
    }

    /// Decode the base64 payload back into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.data)
    }
}

/// One segment of a message: either text or inline binary data.
///
/// Exactly one variant is populated. The externally-tagged serde form
/// matches the persisted layout: `{"text": "..."}` or
/// `{"inline_data": {"mime_type": "...", "data": "..."}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    Text(String),
    InlineData(InlineData),
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    /// The text content, if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(text) => Some(text),
            Part::InlineData(_) => None,
        }
    }
}

/// One turn's content: a role plus ordered parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    /// Create a message with the given role and parts.
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    /// Create a single-part user text message.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    /// Create a single-part model text message.
    pub fn model_text(text: impl Into<String>) -> Self {
        Self::new(Role::Model, vec![Part::text(text)])
    }

    /// Concatenation of all text parts, in order.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in [Role::User, Role::Model] {
            let s = role.to_string();
            let parsed: Role = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_role_serde() {
        let json = serde_json::to_string(&Role::Model).unwrap();
        assert_eq!(json, "\"model\"");
        let parsed: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Role::Model);
    }

    #[test]
    fn test_text_part_serde_shape() {
        let part = Part::text("hello");
        let json = serde_json::to_string(&part).unwrap();
        assert_eq!(json, "{\"text\":\"hello\"}");
        let parsed: Part = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, part);
    }

    #[test]
    fn test_inline_data_part_serde_shape() {
        let part = Part::InlineData(InlineData::from_bytes("image/png", b"\x89PNG"));
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["inline_data"]["mime_type"], "image/png");
        assert!(json["inline_data"]["data"].is_string());
        let parsed: Part = serde_json::from_str(&json.to_string()).unwrap();
        assert_eq!(parsed, part);
    }

    #[test]
    fn test_inline_data_roundtrip() {
        let bytes = vec![0u8, 1, 2, 254, 255];
        let inline = InlineData::from_bytes("application/octet-stream", &bytes);
        assert_eq!(inline.decode().unwrap(), bytes);
    }

    #[test]
    fn test_message_text_concatenation() {
        let message = Message::new(
            Role::Model,
            vec![
                Part::text("Hello"),
                Part::InlineData(InlineData::from_bytes("image/png", b"png")),
                Part::text(" world"),
            ],
        );
        assert_eq!(message.text(), "Hello world");
    }

    #[test]
    fn test_message_part_order_preserved() {
        let message = Message::new(
            Role::User,
            vec![
                Part::text("look at this:"),
                Part::InlineData(InlineData::from_bytes("image/jpeg", b"jpeg")),
            ],
        );
        let json = serde_json::to_string(&message).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, message);
        assert!(matches!(parsed.parts[0], Part::Text(_)));
        assert!(matches!(parsed.parts[1], Part::InlineData(_)));
    }
}
