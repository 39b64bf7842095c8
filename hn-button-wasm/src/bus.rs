//! Publish/subscribe event bus.
//!
//! Handlers are registered per event name and invoked synchronously, in
//! subscription order, whenever that event is emitted. `once` handlers are
//! removed before their first invocation so they never fire twice, even if
//! they re-emit the same event.
//!
//! # Error isolation
//!
//! The bus does not catch anything. A Rust handler that panics unwinds
//! through [`EventBus::emit`] and later handlers are not called. Handlers
//! wrapping foreign callbacks (see the browser bindings) are expected to
//! contain their own failures.

use std::any::Any;
use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::page::FrameRef;

/// Callback invoked with the payload of an emitted event.
pub type Handler = Rc<dyn Fn(&EventData)>;

/// Unique identifier for an event subscription.
pub type SubscriptionId = String;

/// Payload delivered to subscribers.
///
/// `fields` holds the JSON-compatible part of the payload. `target` is the
/// frame an event originated from, when there is one.
///
/// An event can also carry one foreign value: the payload as a binding
/// layer represents it. Set up front when the event came from that layer,
/// or built on first use and then shared by every later handler of the
/// same emit.
#[derive(Clone, Default)]
pub struct EventData {
    pub fields: Map<String, Value>,
    pub target: Option<FrameRef>,
    foreign: OnceCell<Rc<dyn Any>>,
}

impl fmt::Debug for EventData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventData")
            .field("fields", &self.fields)
            .field("target", &self.target.as_ref().map(|frame| frame.name()))
            .finish()
    }
}

impl EventData {
    /// Payload with the given fields and no target frame.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            target: None,
            foreign: OnceCell::new(),
        }
    }

    /// Attach the originating frame.
    #[must_use]
    pub fn with_target(mut self, target: FrameRef) -> Self {
        self.target = Some(target);
        self
    }

    /// Attach the payload as a binding layer originally passed it.
    #[must_use]
    pub fn with_foreign<T: 'static>(self, value: T) -> Self {
        let _ = self.foreign.set(Rc::new(value));
        self
    }

    /// The foreign payload, built by `init` if nothing set it yet.
    ///
    /// `Ok(None)` when the stored value is not a `T`.
    pub fn foreign_or_try_init<T, E>(
        &self,
        init: impl FnOnce(&Self) -> Result<T, E>,
    ) -> Result<Option<&T>, E>
    where
        T: 'static,
    {
        if self.foreign.get().is_none() {
            let value = init(self)?;
            let _ = self.foreign.set(Rc::new(value));
        }
        Ok(self.foreign.get().and_then(|value| value.downcast_ref::<T>()))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The `type` field set on events relayed from a frame.
    pub fn event_type(&self) -> Option<&str> {
        self.fields.get("type").and_then(Value::as_str)
    }

    /// The `id` field set on events relayed from a frame.
    pub fn id(&self) -> Option<&str> {
        self.fields.get("id").and_then(Value::as_str)
    }

    /// Numeric `width`, as reported by a frame's `load` event.
    pub fn width(&self) -> Option<f64> {
        self.fields.get("width").and_then(Value::as_f64)
    }
}

impl From<Map<String, Value>> for EventData {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

struct Subscription {
    id: SubscriptionId,
    handler: Handler,
    once: bool,
}

#[derive(Default)]
struct Subscriptions {
    /// Map of event name -> subscriptions in registration order.
    by_event: HashMap<String, Vec<Subscription>>,
    /// Counter for generating unique subscription IDs.
    next_id: u64,
}

impl Subscriptions {
    fn add(&mut self, event: &str, handler: Handler, once: bool) -> SubscriptionId {
        let id = format!("sub_{}", self.next_id);
        self.next_id += 1;

        self.by_event
            .entry(event.to_string())
            .or_default()
            .push(Subscription {
                id: id.clone(),
                handler,
                once,
            });

        log::debug!("Registered handler '{}' for '{}'", id, event);
        id
    }

    /// Handlers to run for one emit, dropping `once` entries as they are taken.
    fn take_for_emit(&mut self, event: &str) -> Vec<Handler> {
        let Some(subs) = self.by_event.get_mut(event) else {
            return Vec::new();
        };

        let handlers = subs.iter().map(|s| Rc::clone(&s.handler)).collect();
        subs.retain(|s| !s.once);
        if subs.is_empty() {
            self.by_event.remove(event);
        }
        handlers
    }
}

/// Cloneable handle to a shared subscriber table.
///
/// Uses `Rc<RefCell<...>>` since the host is single-threaded.
#[derive(Clone, Default)]
pub struct EventBus {
    subscriptions: Rc<RefCell<Subscriptions>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subs = self.subscriptions.borrow();
        f.debug_struct("EventBus")
            .field("event_count", &subs.by_event.len())
            .field("next_id", &subs.next_id)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to every future `event`.
    pub fn on(&self, event: &str, handler: Handler) -> SubscriptionId {
        self.subscriptions.borrow_mut().add(event, handler, false)
    }

    /// Subscribe `handler` to the next `event` only.
    pub fn once(&self, event: &str, handler: Handler) -> SubscriptionId {
        self.subscriptions.borrow_mut().add(event, handler, true)
    }

    /// Remove subscriptions for `event`.
    ///
    /// With a handler, removes every subscription of that same handler
    /// (pointer identity). Without one, removes all handlers for the event.
    /// Returns how many subscriptions were removed.
    pub fn off(&self, event: &str, handler: Option<&Handler>) -> usize {
        let mut subs = self.subscriptions.borrow_mut();
        let Some(list) = subs.by_event.get_mut(event) else {
            return 0;
        };

        let before = list.len();
        match handler {
            Some(handler) => list.retain(|s| !Rc::ptr_eq(&s.handler, handler)),
            None => list.clear(),
        }
        let removed = before - list.len();

        if list.is_empty() {
            subs.by_event.remove(event);
        }
        log::debug!("Removed {} handler(s) for '{}'", removed, event);
        removed
    }

    /// Remove a single subscription by id. Unknown ids are a no-op.
    pub fn unsubscribe(&self, subscription_id: &str) -> bool {
        let mut subs = self.subscriptions.borrow_mut();
        let mut found = false;
        for list in subs.by_event.values_mut() {
            if let Some(idx) = list.iter().position(|s| s.id == subscription_id) {
                list.remove(idx);
                found = true;
                break;
            }
        }
        subs.by_event.retain(|_, list| !list.is_empty());
        found
    }

    /// Invoke every handler subscribed to `event`, in subscription order.
    ///
    /// Returns the number of handlers invoked.
    pub fn emit(&self, event: &str, data: &EventData) -> usize {
        // Snapshot while borrowed so handlers can touch the bus.
        let handlers = self.subscriptions.borrow_mut().take_for_emit(event);
        // Borrow released here

        for handler in &handlers {
            handler(data);
        }
        handlers.len()
    }

    /// Check if any handlers are registered for an event.
    pub fn has_listeners(&self, event: &str) -> bool {
        self.listener_count(event) > 0
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.subscriptions
            .borrow()
            .by_event
            .get(event)
            .map_or(0, Vec::len)
    }
}
