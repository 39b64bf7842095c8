//! Browser page adapter and JS bindings.
//!
//! On load the module converts every `.hn-button` link, replays calls queued
//! on a placeholder `window.HN` array, then replaces that array with the
//! live [`JsWidgetRegistry`] object:
//!
//! ```js
//! HN.on('vote', function (event) {
//!   console.log(event.type, event.id, event.target);
//! });
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde::Serialize;
use serde_json::{Map, Value};
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, HtmlIFrameElement, MessageEvent, Node, Window};

use crate::bus::{EventData, Handler};
use crate::message::{InboundMessage, MessagePayload};
use crate::page::{Frame, FrameRef, FrameSpec, MessageListener, Page, Placeholder, PlaceholderRef};
use crate::registry::WidgetRegistry;
use crate::replay::{CallArg, DeferredCall};
use crate::settings::Settings;
use crate::WidgetError;

/// Global holding the pre-load queue, and the live object afterwards.
const GLOBAL_NAME: &str = "HN";

/// Optional global with [`Settings`] overrides.
const CONFIG_GLOBAL: &str = "HNConfig";

fn js_err(e: JsValue) -> WidgetError {
    WidgetError::Page(format!("{e:?}"))
}

// ---------------------------------------------------------------------------
// Page adapter
// ---------------------------------------------------------------------------

struct BrowserPage {
    window: Window,
    document: Document,
    /// Keeps `message` listeners alive for the page's lifetime.
    listeners: RefCell<Vec<Closure<dyn FnMut(MessageEvent)>>>,
}

impl BrowserPage {
    fn new(window: Window) -> Result<Self, WidgetError> {
        let document = window
            .document()
            .ok_or_else(|| WidgetError::Page("window has no document".to_string()))?;
        Ok(Self {
            window,
            document,
            listeners: RefCell::new(Vec::new()),
        })
    }
}

impl Page for BrowserPage {
    fn protocol(&self) -> String {
        self.window
            .location()
            .protocol()
            .unwrap_or_else(|_| "https:".to_string())
    }

    fn title(&self) -> String {
        self.document.title()
    }

    fn location(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }

    fn placeholders(&self, class_name: &str) -> Vec<PlaceholderRef> {
        // Static NodeList: frames created while converting are not revisited.
        let nodes = match self.document.query_selector_all(&format!(".{class_name}")) {
            Ok(nodes) => nodes,
            Err(e) => {
                log::warn!("Placeholder query failed: {:?}", e);
                return Vec::new();
            }
        };

        (0..nodes.length())
            .filter_map(|idx| nodes.get(idx))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .filter(|element| !element.tag_name().eq_ignore_ascii_case("iframe"))
            .map(|element| Rc::new(BrowserElement { element }) as PlaceholderRef)
            .collect()
    }

    fn listen_for_messages(&self, listener: MessageListener) -> Result<(), WidgetError> {
        let closure = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            // Most traffic on this channel is not ours; drop it quietly.
            let Ok(payload) = serde_wasm_bindgen::from_value::<MessagePayload>(event.data()) else {
                return;
            };
            listener(&InboundMessage::new(event.origin(), payload));
        });

        self.window
            .add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
            .map_err(js_err)?;
        self.listeners.borrow_mut().push(closure);
        Ok(())
    }
}

struct BrowserElement {
    element: Element,
}

impl Placeholder for BrowserElement {
    fn attribute(&self, name: &str) -> Option<String> {
        self.element.get_attribute(name)
    }

    fn replace_with_frame(&self, spec: &FrameSpec) -> Result<FrameRef, WidgetError> {
        let document = self
            .element
            .owner_document()
            .ok_or(WidgetError::DetachedPlaceholder)?;
        let parent = self
            .element
            .parent_node()
            .ok_or(WidgetError::DetachedPlaceholder)?;

        let iframe: HtmlIFrameElement = document
            .create_element("iframe")
            .map_err(js_err)?
            .dyn_into()
            .map_err(|_| WidgetError::Page("created element is not an iframe".to_string()))?;

        iframe.set_src(&spec.src);
        iframe.set_id(&spec.id);
        iframe.set_name(&spec.id);
        iframe.set_class_name(&spec.class_name);
        for (name, value) in &spec.data_attributes {
            iframe.set_attribute(name, value).map_err(js_err)?;
        }
        iframe.set_title(&spec.title);
        iframe.set_height(&spec.height.to_string());
        iframe.set_width(&spec.width.to_string());
        iframe.set_frame_border(&spec.frame_border.to_string());

        let anchor: &Node = &self.element;
        parent.insert_before(&iframe, Some(anchor)).map_err(js_err)?;
        parent.remove_child(anchor).map_err(js_err)?;

        Ok(Rc::new(BrowserFrame { element: iframe }))
    }
}

struct BrowserFrame {
    element: HtmlIFrameElement,
}

impl Frame for BrowserFrame {
    fn name(&self) -> String {
        self.element.id()
    }

    fn width(&self) -> u32 {
        self.element.width().parse().unwrap_or(0)
    }

    fn set_width(&self, width: u32) {
        self.element.set_width(&width.to_string());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// JS-facing registry
// ---------------------------------------------------------------------------

/// The `HN` object handed to page scripts.
#[wasm_bindgen(js_name = "HN")]
pub struct JsWidgetRegistry {
    registry: WidgetRegistry,
    /// JS functions seen so far and their wrappers, so `off` can find them.
    /// Entries stay after `off`; a function passed again reuses its wrapper.
    handlers: RefCell<Vec<(js_sys::Function, Handler)>>,
}

#[wasm_bindgen(js_class = "HN")]
impl JsWidgetRegistry {
    /// Call `handler` for every future `event`.
    pub fn on(&self, event: &str, handler: js_sys::Function) {
        self.registry.on(event, self.handler_for(handler));
    }

    /// Call `handler` for the next `event` only.
    pub fn once(&self, event: &str, handler: js_sys::Function) {
        self.registry.once(event, self.handler_for(handler));
    }

    /// Remove `handler` from `event`, or all handlers when omitted.
    pub fn off(&self, event: &str, handler: Option<js_sys::Function>) {
        match handler {
            Some(func) => {
                if let Some(handler) = self.cached_handler(&func) {
                    self.registry.off(event, Some(&handler));
                }
            }
            None => {
                self.registry.off(event, None);
            }
        }
    }

    #[wasm_bindgen(js_name = "addEventListener")]
    pub fn add_event_listener(&self, event: &str, handler: js_sys::Function) {
        self.on(event, handler);
    }

    #[wasm_bindgen(js_name = "removeListener")]
    pub fn remove_listener(&self, event: &str, handler: Option<js_sys::Function>) {
        self.off(event, handler);
    }

    #[wasm_bindgen(js_name = "removeEventListener")]
    pub fn remove_event_listener(&self, event: &str, handler: Option<js_sys::Function>) {
        self.off(event, handler);
    }

    #[wasm_bindgen(js_name = "removeAllListeners")]
    pub fn remove_all_listeners(&self, event: &str, handler: Option<js_sys::Function>) {
        self.off(event, handler);
    }

    /// Invoke every handler for `event` with `data`.
    ///
    /// JS handlers receive `data` itself, whatever its shape.
    pub fn emit(&self, event: &str, data: JsValue) {
        self.registry.emit(event, &event_data_from_js(data));
    }

    /// Convert a placeholder element into a button.
    pub fn initialize(&self, element: Element) -> Result<(), JsValue> {
        self.registry.initialize(&BrowserElement { element })?;
        Ok(())
    }
}

impl JsWidgetRegistry {
    fn new(registry: WidgetRegistry) -> Self {
        Self {
            registry,
            handlers: RefCell::new(Vec::new()),
        }
    }

    fn cached_handler(&self, func: &js_sys::Function) -> Option<Handler> {
        self.handlers
            .borrow()
            .iter()
            .find(|(known, _)| same_function(known, func))
            .map(|(_, handler)| Rc::clone(handler))
    }

    /// Wrapper for `func`, reused across calls so identity survives `off`.
    fn handler_for(&self, func: js_sys::Function) -> Handler {
        if let Some(handler) = self.cached_handler(&func) {
            return handler;
        }

        let callback = func.clone();
        let handler: Handler = Rc::new(move |event: &EventData| {
            // The first JS handler of an emit builds the payload; the rest share it.
            let result = event.foreign_or_try_init(event_to_js).and_then(|value| {
                let value = value.cloned().unwrap_or(JsValue::UNDEFINED);
                callback.call1(&JsValue::NULL, &value)
            });
            if let Err(e) = result {
                log::warn!("Event handler threw: {:?}", e);
            }
        });
        self.handlers
            .borrow_mut()
            .push((func, Rc::clone(&handler)));
        handler
    }

    /// Drain `window.HN` if a page script queued calls on it.
    fn take_queue(&self, window: &Window) -> Result<VecDeque<DeferredCall>, JsValue> {
        let mut queue = VecDeque::new();
        let pending = js_sys::Reflect::get(window, &GLOBAL_NAME.into())?;
        let Some(pending) = pending.dyn_ref::<js_sys::Array>() else {
            return Ok(queue);
        };

        while pending.length() > 0 {
            let item = pending.shift();
            let Some(item) = item.dyn_ref::<js_sys::Array>() else {
                continue;
            };
            let Some(method) = item.get(0).as_string() else {
                continue;
            };
            let args = (1..item.length())
                .map(|idx| self.call_arg(item.get(idx)))
                .collect();
            queue.push_back(DeferredCall::new(method, args));
        }
        Ok(queue)
    }

    fn call_arg(&self, value: JsValue) -> CallArg {
        if let Some(func) = value.dyn_ref::<js_sys::Function>() {
            return CallArg::Handler(self.handler_for(func.clone()));
        }
        if let Some(text) = value.as_string() {
            return CallArg::Text(text);
        }
        if let Some(element) = value.dyn_ref::<Element>() {
            return CallArg::Element(Rc::new(BrowserElement {
                element: element.clone(),
            }));
        }
        match serde_wasm_bindgen::from_value::<Value>(value) {
            Ok(value) => CallArg::Value(value),
            Err(e) => {
                log::debug!("Queued argument is not plain data: {}", e);
                CallArg::Value(Value::Null)
            }
        }
    }
}

fn same_function(a: &js_sys::Function, b: &js_sys::Function) -> bool {
    let a: &JsValue = a;
    let b: &JsValue = b;
    a == b
}

/// Plain JS object with the event fields, plus `target` as the `<iframe>`.
fn event_to_js(event: &EventData) -> Result<JsValue, JsValue> {
    let value = event
        .fields
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())?;

    let frame = event
        .target
        .as_ref()
        .and_then(|target| target.as_any().downcast_ref::<BrowserFrame>());
    if let Some(frame) = frame {
        js_sys::Reflect::set(&value, &"target".into(), &frame.element)?;
    }
    Ok(value)
}

/// Event for a payload emitted by page script.
///
/// `data` travels on unchanged for JS handlers. Native handlers get a JSON
/// view of its own fields, leaving out values JSON cannot hold.
fn event_data_from_js(data: JsValue) -> EventData {
    let mut fields = Map::new();
    let mut target = None;

    let entries = data
        .dyn_ref::<js_sys::Object>()
        .filter(|_| !js_sys::Array::is_array(&data))
        .map(js_sys::Object::entries);
    for entry in entries.iter().flat_map(|entries| entries.iter()) {
        let entry: js_sys::Array = entry.unchecked_into();
        let Some(key) = entry.get(0).as_string() else {
            continue;
        };
        let value = entry.get(1);
        if key == "target" {
            target = value.dyn_into::<HtmlIFrameElement>().ok();
        } else if let Ok(value) = serde_wasm_bindgen::from_value::<Value>(value) {
            fields.insert(key, value);
        }
    }

    let mut event = EventData::new(fields).with_foreign(data);
    if let Some(element) = target {
        event = event.with_target(Rc::new(BrowserFrame { element }));
    }
    event
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Route `log` records to the devtools console at the configured level.
///
/// Only the first call installs a logger; `off` installs none.
fn init_logging(settings: &Settings) {
    if let Some(level) = settings.level_filter().to_level() {
        let _ = console_log::init_with_level(level);
    }
}

fn read_settings(window: &Window) -> Result<Settings, String> {
    let value = js_sys::Reflect::get(window, &CONFIG_GLOBAL.into()).map_err(|e| format!("{e:?}"))?;
    if value.is_undefined() || value.is_null() {
        return Ok(Settings::default());
    }
    serde_wasm_bindgen::from_value(value).map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Start-up
// ---------------------------------------------------------------------------

/// Initialize the WASM module: convert buttons, replay, publish `HN`.
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    // Set up panic hook for better error messages in browser console
    console_error_panic_hook::set_once();

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))?;

    let (settings, settings_error) = match read_settings(&window) {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };
    init_logging(&settings);
    if let Some(e) = settings_error {
        log::warn!("Ignoring malformed {}: {}", CONFIG_GLOBAL, e);
    }

    let page = Rc::new(BrowserPage::new(window.clone())?);
    let registry = WidgetRegistry::new(page, settings);
    let hn = JsWidgetRegistry::new(registry.clone());

    registry.scan();
    let mut queue = hn.take_queue(&window)?;
    registry.replay(&mut queue)?;

    js_sys::Reflect::set(&window, &GLOBAL_NAME.into(), &JsValue::from(hn))?;
    Ok(())
}
