//! Error type for widget setup and replay.
//!
//! Inbound cross-window traffic never produces a `WidgetError`: messages
//! that fail validation are dropped without a signal. Errors only surface
//! from operations the host page asked for directly (initializing a
//! placeholder, replaying queued calls).

use thiserror::Error;

/// Errors raised by the registry, the page adapters, and replay.
#[derive(Error, Debug)]
pub enum WidgetError {
    #[error("placeholder element is not attached to the page")]
    DetachedPlaceholder,
    #[error("page operation failed: {0}")]
    Page(String),
    #[error("invalid arguments for queued call '{method}': {reason}")]
    InvalidCall { method: String, reason: String },
    #[error("queued calls were already replayed")]
    AlreadyReplayed,
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl WidgetError {
    pub(crate) fn invalid_call(method: &str, reason: impl Into<String>) -> Self {
        Self::InvalidCall {
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl From<WidgetError> for wasm_bindgen::JsValue {
    fn from(err: WidgetError) -> Self {
        wasm_bindgen::JsValue::from_str(&err.to_string())
    }
}
