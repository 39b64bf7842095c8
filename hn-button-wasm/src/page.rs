//! Page adapter seam.
//!
//! The registry never touches a real document. It talks to a [`Page`] for
//! page-level facts and the inbound message channel, to [`Placeholder`]s for
//! their attributes and the frame swap, and to [`Frame`]s for resizing.
//!
//! Two adapters ship with the crate:
//!
//! - `browser` (wasm32 only): `web-sys` elements and `window.postMessage`.
//! - [`crate::memory`]: an in-memory document for headless hosts and tests.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::message::InboundMessage;
use crate::WidgetError;

/// Shared reference to an embedded frame.
pub type FrameRef = Rc<dyn Frame>;

/// Shared reference to a placeholder element.
pub type PlaceholderRef = Rc<dyn Placeholder>;

/// Callback receiving every message posted to the page.
pub type MessageListener = Box<dyn Fn(&InboundMessage)>;

/// The host page.
pub trait Page {
    /// Page protocol including the trailing colon, e.g. `"https:"`.
    fn protocol(&self) -> String;

    /// Document title, the fallback for `data-title`.
    fn title(&self) -> String;

    /// Current page URL, the fallback for `data-url`.
    fn location(&self) -> String;

    /// Placeholders bearing `class_name` that have not been converted yet,
    /// in document order.
    fn placeholders(&self, class_name: &str) -> Vec<PlaceholderRef>;

    /// Register a listener on the page-wide inbound message channel.
    ///
    /// Each call adds an independent listener; nothing is shared between
    /// listeners.
    fn listen_for_messages(&self, listener: MessageListener) -> Result<(), WidgetError>;
}

/// An element marked for conversion into a widget.
pub trait Placeholder {
    /// Attribute value, `None` when absent.
    fn attribute(&self, name: &str) -> Option<String>;

    /// Insert a frame built from `spec` in place of this element, then
    /// remove this element from the page.
    fn replace_with_frame(&self, spec: &FrameSpec) -> Result<FrameRef, WidgetError>;
}

/// An embedded cross-origin frame.
pub trait Frame {
    /// Element id (and name) of the frame.
    fn name(&self) -> String;

    fn width(&self) -> u32;

    fn set_width(&self, width: u32);

    fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("name", &self.name())
            .field("width", &self.width())
            .finish()
    }
}

/// Everything an adapter needs to build a replacement frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSpec {
    /// Used as both the element id and the frame name.
    pub id: String,
    pub class_name: String,
    pub src: String,
    /// Accessible title.
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub frame_border: u32,
    /// `data-*` attributes mirrored from the placeholder, in order.
    pub data_attributes: Vec<(String, String)>,
}

impl FrameSpec {
    /// Value of a mirrored `data-*` attribute.
    pub fn data_attribute(&self, name: &str) -> Option<&str> {
        self.data_attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}
