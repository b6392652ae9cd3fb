//! Cached response bodies.

use serde::{Deserialize, Serialize};

/// The value stored under a cache key.
///
/// The store validates the shape at its boundary (the serde tag), then treats
/// the content as opaque: the engine never inspects a response beyond
/// serializing it, so any payload a host wants to cache fits one of the three
/// kinds. Binary bodies are base64-encoded in the persisted JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResponseBody {
    /// Plain text, the common case for AI-generated answers.
    Text(String),
    /// Structured output (tool results, JSON-mode completions).
    Json(serde_json::Value),
    /// Anything else, stored verbatim.
    Binary(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl ResponseBody {
    pub fn text(value: impl Into<String>) -> Self {
        ResponseBody::Text(value.into())
    }

    pub fn json(value: serde_json::Value) -> Self {
        ResponseBody::Json(value)
    }

    pub fn binary(value: impl Into<Vec<u8>>) -> Self {
        ResponseBody::Binary(value.into())
    }

    /// Borrow the text content, if this is a text body.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Rough in-memory size, used only for log lines; the store accounts for
    /// the serialized byte size instead.
    pub fn size_hint(&self) -> usize {
        match self {
            ResponseBody::Text(s) => s.len(),
            ResponseBody::Json(v) => v.to_string().len(),
            ResponseBody::Binary(b) => b.len(),
        }
    }
}

impl From<&str> for ResponseBody {
    fn from(value: &str) -> Self {
        ResponseBody::Text(value.to_string())
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        ResponseBody::Text(value)
    }
}

impl From<serde_json::Value> for ResponseBody {
    fn from(value: serde_json::Value) -> Self {
        ResponseBody::Json(value)
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
