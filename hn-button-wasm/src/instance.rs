//! One embedded button.
//!
//! A [`WidgetInstance`] owns its frame and polices the page-wide message
//! channel on that frame's behalf. Only messages from the frame's origin
//! carrying this instance's correlation id reach the event bus.

use std::fmt;

use serde_json::Value;

use crate::bus::{EventBus, EventData};
use crate::message::{InboundMessage, Rejection};
use crate::options::{ButtonOptions, HOST_ATTRIBUTE};
use crate::page::{FrameRef, Page, Placeholder};
use crate::settings::Settings;
use crate::WidgetError;

/// A live button: identity, trusted origin, and frame.
pub struct WidgetInstance {
    id: String,
    origin: String,
    frame: FrameRef,
    bus: EventBus,
}

impl fmt::Debug for WidgetInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetInstance")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("frame", &self.frame.name())
            .finish()
    }
}

impl WidgetInstance {
    /// Swap `element` for a frame and bind the result to `id`.
    ///
    /// The message listener is wired up by the registry once the instance
    /// is shared; see [`crate::WidgetRegistry::initialize`].
    pub(crate) fn create(
        element: &dyn Placeholder,
        page: &dyn Page,
        settings: &Settings,
        id: String,
        bus: EventBus,
    ) -> Result<Self, WidgetError> {
        let origin = frame_origin(element, page, settings);
        let options = ButtonOptions::from_placeholder(element, page);
        let spec = options.frame_spec(&id, &origin, settings);

        let frame = element.replace_with_frame(&spec)?;
        log::debug!("Rendered button '{}' from {}", id, spec.src);

        Ok(Self {
            id,
            origin,
            frame,
            bus,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn frame(&self) -> &FrameRef {
        &self.frame
    }

    /// Validate `message` and relay it to the bus.
    ///
    /// Checks run in order and stop at the first failure: sender origin,
    /// then correlation id. An accepted message is emitted exactly once
    /// under its event name with `type`, `id` and `target` added to its data.
    pub fn handle_message(&self, message: &InboundMessage) -> Result<(), Rejection> {
        if message.origin != self.origin {
            return Err(Rejection::OriginMismatch {
                expected: self.origin.clone(),
                actual: message.origin.clone(),
            });
        }
        if message.payload.id != self.id {
            return Err(Rejection::IdMismatch {
                expected: self.id.clone(),
                actual: message.payload.id.clone(),
            });
        }

        let event = &message.payload.event;
        let mut fields = message.payload.data.clone();
        fields.insert("type".to_string(), Value::String(event.clone()));
        fields.insert("id".to_string(), Value::String(self.id.clone()));

        let data = EventData::new(fields).with_target(FrameRef::clone(&self.frame));
        self.bus.emit(event, &data);
        Ok(())
    }
}

/// `<page protocol>//<host>`, with the host from `data-host` or settings.
fn frame_origin(element: &dyn Placeholder, page: &dyn Page, settings: &Settings) -> String {
    let host = element
        .attribute(HOST_ATTRIBUTE)
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| settings.default_host.clone());
    format!("{}//{}", page.protocol(), host)
}
