//! The widget registry: event hub for every button on the page.
//!
//! Other code subscribes here for button events. The registry also turns
//! placeholders into live [`WidgetInstance`]s and reacts to the one event it
//! cares about itself: `load`, which carries the frame's real width.
//!
//! # Lifecycle
//!
//! ```text
//! WidgetRegistry::start(page, settings, queue)
//!   ├─ new()      install the built-in `load` handler
//!   ├─ scan()     initialize every placeholder on the page
//!   └─ replay()   drain calls queued before start
//! ```

use std::cell::{Cell, OnceCell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use uuid::Uuid;

use crate::bus::{EventBus, EventData, Handler, SubscriptionId};
use crate::instance::WidgetInstance;
use crate::message::{InboundMessage, Rejection};
use crate::page::{Page, Placeholder};
use crate::replay::{self, DeferredCall, ReplayReport};
use crate::settings::Settings;
use crate::WidgetError;

/// Event a frame sends once rendered, with its content `width`.
pub const LOAD_EVENT: &str = "load";

/// Callback told about every rejected inbound message.
pub type DiagnosticHook = Rc<dyn Fn(&str, &Rejection)>;

struct RegistryInner {
    bus: EventBus,
    page: Rc<dyn Page>,
    settings: Settings,
    /// Live instances, in creation order. Never pruned: a frame removed
    /// from the page keeps its entry.
    instances: RefCell<Vec<Rc<WidgetInstance>>>,
    diagnostics: Rc<RefCell<Option<DiagnosticHook>>>,
    replayed: Cell<bool>,
}

/// Cloneable handle to the shared registry.
#[derive(Clone)]
pub struct WidgetRegistry {
    inner: Rc<RegistryInner>,
}

impl fmt::Debug for WidgetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetRegistry")
            .field("bus", &self.inner.bus)
            .field("instances", &self.inner.instances.borrow().len())
            .field("replayed", &self.inner.replayed.get())
            .finish()
    }
}

impl WidgetRegistry {
    /// Create a registry bound to `page` with the `load` handler installed.
    pub fn new(page: Rc<dyn Page>, settings: Settings) -> Self {
        let bus = EventBus::new();
        bus.on(LOAD_EVENT, Rc::new(resize_on_load));
        log::debug!("Widget registry created (marker class '{}')", settings.marker_class);

        Self {
            inner: Rc::new(RegistryInner {
                bus,
                page,
                settings,
                instances: RefCell::new(Vec::new()),
                diagnostics: Rc::new(RefCell::new(None)),
                replayed: Cell::new(false),
            }),
        }
    }

    /// Create a registry, convert the page's placeholders, then replay
    /// `queue`. This is the order a freshly loaded page goes through.
    pub fn start(
        page: Rc<dyn Page>,
        settings: Settings,
        queue: &mut VecDeque<DeferredCall>,
    ) -> Result<(Self, ReplayReport), WidgetError> {
        let registry = Self::new(page, settings);
        registry.scan();
        let report = registry.replay(queue)?;
        Ok((registry, report))
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// The underlying event bus.
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn on(&self, event: &str, handler: Handler) -> SubscriptionId {
        self.inner.bus.on(event, handler)
    }

    pub fn once(&self, event: &str, handler: Handler) -> SubscriptionId {
        self.inner.bus.once(event, handler)
    }

    /// Remove `handler` from `event`, or every handler when `None`.
    pub fn off(&self, event: &str, handler: Option<&Handler>) -> usize {
        self.inner.bus.off(event, handler)
    }

    pub fn unsubscribe(&self, subscription_id: &str) -> bool {
        self.inner.bus.unsubscribe(subscription_id)
    }

    /// Invoke every subscriber of `event` synchronously, in order.
    pub fn emit(&self, event: &str, data: &EventData) -> usize {
        self.inner.bus.emit(event, data)
    }

    /// Install a hook told about rejected inbound messages.
    ///
    /// Without a hook, rejection leaves no trace at all.
    pub fn set_diagnostics(&self, hook: Option<DiagnosticHook>) {
        *self.inner.diagnostics.borrow_mut() = hook;
    }

    /// Turn `element` into a live button and return its id.
    ///
    /// The message listener goes in before the frame swap, so a page that
    /// refuses listeners leaves the placeholder untouched. A listener whose
    /// swap then fails stays registered but never sees an instance.
    pub fn initialize(&self, element: &dyn Placeholder) -> Result<String, WidgetError> {
        let inner = &self.inner;
        let id = self.fresh_id();

        let slot: Rc<OnceCell<Rc<WidgetInstance>>> = Rc::new(OnceCell::new());
        let listener_slot = Rc::clone(&slot);
        let diagnostics = Rc::clone(&inner.diagnostics);
        inner
            .page
            .listen_for_messages(Box::new(move |message: &InboundMessage| {
                let Some(instance) = listener_slot.get() else {
                    return;
                };
                if let Err(rejection) = instance.handle_message(message) {
                    let hook = diagnostics.borrow().clone();
                    if let Some(hook) = hook {
                        hook(instance.id(), &rejection);
                    }
                }
            }))?;

        let instance = Rc::new(WidgetInstance::create(
            element,
            inner.page.as_ref(),
            &inner.settings,
            id.clone(),
            inner.bus.clone(),
        )?);
        let _ = slot.set(Rc::clone(&instance));

        inner.instances.borrow_mut().push(instance);
        log::debug!("Initialized button '{}'", id);
        Ok(id)
    }

    /// Initialize every placeholder bearing the marker class.
    ///
    /// A placeholder that fails to convert is logged and skipped. Returns
    /// the number of buttons created.
    pub fn scan(&self) -> usize {
        let placeholders = self.inner.page.placeholders(&self.inner.settings.marker_class);
        let mut created = 0;
        for element in placeholders {
            match self.initialize(element.as_ref()) {
                Ok(_) => created += 1,
                Err(e) => log::warn!("Failed to initialize button: {}", e),
            }
        }
        created
    }

    /// Drain `queue` into this registry. See [`crate::replay`].
    pub fn replay(&self, queue: &mut VecDeque<DeferredCall>) -> Result<ReplayReport, WidgetError> {
        if self.inner.replayed.replace(true) {
            return Err(WidgetError::AlreadyReplayed);
        }
        Ok(replay::drain(self, queue))
    }

    pub fn instance(&self, id: &str) -> Option<Rc<WidgetInstance>> {
        self.inner
            .instances
            .borrow()
            .iter()
            .find(|instance| instance.id() == id)
            .cloned()
    }

    /// Ids of all live instances, in creation order.
    pub fn instance_ids(&self) -> Vec<String> {
        self.inner
            .instances
            .borrow()
            .iter()
            .map(|instance| instance.id().to_string())
            .collect()
    }

    /// `<prefix>-<random>`, regenerated until no live instance uses it.
    fn fresh_id(&self) -> String {
        let instances = self.inner.instances.borrow();
        loop {
            let id = format!(
                "{}-{}",
                self.inner.settings.id_prefix,
                Uuid::new_v4().simple()
            );
            if !instances.iter().any(|instance| instance.id() == id) {
                return id;
            }
        }
    }
}

/// Built-in `load` handler: size the frame to its reported width.
///
/// Rounds up, since rounding down would clip the button.
fn resize_on_load(event: &EventData) {
    let (Some(width), Some(target)) = (event.width(), event.target.as_ref()) else {
        return;
    };
    let pixels = width.ceil() as u32;
    target.set_width(pixels);
    log::debug!("Resized '{}' to {}px", target.name(), pixels);
}
