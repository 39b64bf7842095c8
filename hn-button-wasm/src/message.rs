//! Inbound cross-window messages.
//!
//! A button frame talks to the host page with
//! `parent.postMessage({id, event, data}, "*")`. The page sees the sender's
//! origin alongside that payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of a message posted by a button frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Correlation id of the instance the frame belongs to.
    pub id: String,
    /// Event name to emit on the registry.
    pub event: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// A message received on the page's message channel.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Origin of the sending window, e.g. `"https://hn-button.herokuapp.com"`.
    pub origin: String,
    pub payload: MessagePayload,
}

impl InboundMessage {
    pub fn new(origin: impl Into<String>, payload: MessagePayload) -> Self {
        Self {
            origin: origin.into(),
            payload,
        }
    }

    /// Decode a JSON payload. `None` when it is not a button message.
    pub fn from_json(origin: impl Into<String>, payload_json: &str) -> Option<Self> {
        let payload = serde_json::from_str(payload_json).ok()?;
        Some(Self::new(origin, payload))
    }
}

/// Why an instance ignored a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Sent from an origin other than the instance's frame origin.
    OriginMismatch { expected: String, actual: String },
    /// Addressed to another instance.
    IdMismatch { expected: String, actual: String },
}
