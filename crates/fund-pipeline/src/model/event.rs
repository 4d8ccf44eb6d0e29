//! Streaming events received from an analysis engine

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One inbound frame.
///
/// `type` is the only required field. Everything the frame carries beyond
/// `content` and `message` is kept in `extra` so terminal payloads can be read
/// back out without a second parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingEvent {
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StreamingEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            content: None,
            message: None,
            extra: Map::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<Value>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Parse a raw text frame
    pub fn parse(frame: &str) -> serde_json::Result<Self> {
        serde_json::from_str(frame)
    }

    /// Read a non-null top-level field other than `type` and `message`
    pub fn field(&self, name: &str) -> Option<&Value> {
        match name {
            "content" => self.content.as_ref(),
            _ => self.extra.get(name),
        }
        .filter(|v| !v.is_null())
    }

    /// Progress narrative: `content` when it is a non-empty string, otherwise
    /// a non-empty `message`.
    pub fn narrative(&self) -> Option<&str> {
        self.content
            .as_ref()
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.message.as_deref().filter(|s| !s.trim().is_empty()))
    }

    /// Failure text carried by an `error` frame or a `status: "error"` frame
    pub fn failure(&self) -> Option<String> {
        let is_error = self.event_type == "error"
            || self
                .extra
                .get("status")
                .and_then(Value::as_str)
                .is_some_and(|s| s.eq_ignore_ascii_case("error"));
        if !is_error {
            return None;
        }

        self.extra
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.narrative().map(str::to_string))
            .or_else(|| Some(format!("{} event without message", self.event_type)))
    }
}
