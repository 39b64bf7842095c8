//! In-memory page adapter.
//!
//! Models just enough of a document for the widget: a flat list of
//! placeholder and frame nodes, page metadata, and a message channel that
//! delivers to every registered listener. Useful for headless hosts and for
//! exercising the protocol without a browser.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::message::{InboundMessage, MessagePayload};
use crate::page::{Frame, FrameRef, FrameSpec, MessageListener, Page, Placeholder, PlaceholderRef};
use crate::WidgetError;

type Nodes = Rc<RefCell<Vec<Node>>>;

#[derive(Clone)]
enum Node {
    Placeholder(Rc<MemoryElement>),
    Frame(Rc<MemoryFrame>),
}

/// A document held in memory.
pub struct MemoryPage {
    protocol: String,
    title: String,
    location: String,
    nodes: Nodes,
    listeners: RefCell<Vec<Rc<dyn Fn(&InboundMessage)>>>,
    next_key: Cell<u64>,
}

impl fmt::Debug for MemoryPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPage")
            .field("location", &self.location)
            .field("nodes", &self.nodes.borrow().len())
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

impl MemoryPage {
    /// Empty page. `protocol` includes the colon, e.g. `"https:"`.
    pub fn new(
        protocol: impl Into<String>,
        title: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            title: title.into(),
            location: location.into(),
            nodes: Rc::new(RefCell::new(Vec::new())),
            listeners: RefCell::new(Vec::new()),
            next_key: Cell::new(0),
        }
    }

    /// Append an element with `class_name` and the given attributes.
    pub fn add_placeholder(&self, class_name: &str, attributes: &[(&str, &str)]) -> Rc<MemoryElement> {
        let key = self.next_key.get();
        self.next_key.set(key + 1);

        let element = Rc::new(MemoryElement {
            key,
            class_name: class_name.to_string(),
            attributes: attributes
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            nodes: Rc::downgrade(&self.nodes),
        });
        self.nodes
            .borrow_mut()
            .push(Node::Placeholder(Rc::clone(&element)));
        element
    }

    /// Deliver a message to every listener registered so far.
    ///
    /// Returns the number of listeners the message reached.
    pub fn post_message(&self, origin: &str, payload: MessagePayload) -> usize {
        let message = InboundMessage::new(origin, payload);
        // Listeners may register more listeners while handling.
        let listeners: Vec<_> = self.listeners.borrow().iter().cloned().collect();
        for listener in &listeners {
            listener(&message);
        }
        listeners.len()
    }

    /// Deliver a raw JSON payload. Payloads that are not button messages
    /// are dropped, as a browser adapter drops them.
    pub fn post_json(&self, origin: &str, payload_json: &str) -> usize {
        match InboundMessage::from_json(origin, payload_json) {
            Some(message) => self.post_message(&message.origin, message.payload),
            None => 0,
        }
    }

    /// Frames in document order.
    pub fn frames(&self) -> Vec<Rc<MemoryFrame>> {
        self.nodes
            .borrow()
            .iter()
            .filter_map(|node| match node {
                Node::Frame(frame) => Some(Rc::clone(frame)),
                Node::Placeholder(_) => None,
            })
            .collect()
    }

    /// Frame with element id `id`.
    pub fn frame(&self, id: &str) -> Option<Rc<MemoryFrame>> {
        self.frames().into_iter().find(|frame| frame.spec.id == id)
    }

    /// Placeholders of any class still on the page.
    pub fn placeholders_remaining(&self) -> usize {
        self.nodes
            .borrow()
            .iter()
            .filter(|node| matches!(node, Node::Placeholder(_)))
            .count()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl Page for MemoryPage {
    fn protocol(&self) -> String {
        self.protocol.clone()
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn location(&self) -> String {
        self.location.clone()
    }

    fn placeholders(&self, class_name: &str) -> Vec<PlaceholderRef> {
        self.nodes
            .borrow()
            .iter()
            .filter_map(|node| match node {
                Node::Placeholder(element) if element.class_name == class_name => {
                    Some(Rc::clone(element) as PlaceholderRef)
                }
                _ => None,
            })
            .collect()
    }

    fn listen_for_messages(&self, listener: MessageListener) -> Result<(), WidgetError> {
        self.listeners.borrow_mut().push(Rc::from(listener));
        Ok(())
    }
}

/// A placeholder element in a [`MemoryPage`].
pub struct MemoryElement {
    key: u64,
    class_name: String,
    attributes: Vec<(String, String)>,
    nodes: Weak<RefCell<Vec<Node>>>,
}

impl fmt::Debug for MemoryElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryElement")
            .field("key", &self.key)
            .field("class_name", &self.class_name)
            .field("attributes", &self.attributes)
            .finish()
    }
}

impl MemoryElement {
    /// Whether the element is still in its page.
    pub fn is_attached(&self) -> bool {
        let Some(nodes) = self.nodes.upgrade() else {
            return false;
        };
        let nodes = nodes.borrow();
        self.position(&nodes).is_some()
    }

    fn position(&self, nodes: &[Node]) -> Option<usize> {
        nodes.iter().position(|node| match node {
            Node::Placeholder(element) => element.key == self.key,
            Node::Frame(_) => false,
        })
    }
}

impl Placeholder for MemoryElement {
    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    fn replace_with_frame(&self, spec: &FrameSpec) -> Result<FrameRef, WidgetError> {
        let nodes = self.nodes.upgrade().ok_or(WidgetError::DetachedPlaceholder)?;
        let mut nodes = nodes.borrow_mut();
        let idx = self
            .position(&nodes)
            .ok_or(WidgetError::DetachedPlaceholder)?;

        let frame = Rc::new(MemoryFrame {
            spec: spec.clone(),
            width: Cell::new(spec.width),
        });
        // Insert before, then remove: the placeholder's slot goes to the frame.
        nodes.insert(idx, Node::Frame(Rc::clone(&frame)));
        nodes.remove(idx + 1);
        Ok(frame)
    }
}

/// A frame in a [`MemoryPage`].
#[derive(Debug)]
pub struct MemoryFrame {
    spec: FrameSpec,
    width: Cell<u32>,
}

impl MemoryFrame {
    /// The description the frame was built from. `width` there is the initial width.
    pub fn spec(&self) -> &FrameSpec {
        &self.spec
    }
}

impl Frame for MemoryFrame {
    fn name(&self) -> String {
        self.spec.id.clone()
    }

    fn width(&self) -> u32 {
        self.width.get()
    }

    fn set_width(&self, width: u32) {
        self.width.set(width);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
