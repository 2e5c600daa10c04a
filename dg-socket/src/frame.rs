//! Wire envelopes.
//!
//! Inbound frames are `{"type": ..., "data": ...}`. Outbound requests put
//! their fields next to `type` at the top level, e.g.
//! `{"type":"unlock_door","duration":10}`.

use serde::Deserialize;
use serde_json::{Map, Value};

/// A parsed inbound frame. Extra top-level fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub kind: String,
    /// Missing `data` deserializes as `null`.
    #[serde(default)]
    pub data: Value,
}

impl InboundFrame {
    /// Parse one text frame.
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// An outbound request frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    kind: String,
    fields: Map<String, Value>,
}

impl Request {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// Add a top-level field. A field named `type` is ignored.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        if key != "type" {
            self.fields.insert(key.to_string(), value.into());
        }
        self
    }

    /// Add a field only when `value` is present.
    pub fn with_opt(self, key: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Render as a JSON object with `type` first.
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(self.fields.len() + 1);
        map.insert("type".to_string(), Value::String(self.kind.clone()));
        for (k, v) in &self.fields {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(map)
    }

    /// Render as the text sent on the wire.
    pub fn to_text(&self) -> String {
        self.to_value().to_string()
    }
}
