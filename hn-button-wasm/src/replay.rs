//! Replay of calls queued before the library loaded.
//!
//! Host pages can use the API before the module is ready by pushing
//! `[method, ...args]` arrays onto a placeholder `HN` array:
//!
//! ```js
//! window.HN = window.HN || [];
//! HN.push(['on', 'vote', function (event) { ... }]);
//! ```
//!
//! At start-up those calls are drained in FIFO order and dispatched through
//! an explicit table of known registry methods. Unknown method names are
//! skipped without a trace so that snippets written for newer versions keep
//! working.

use std::collections::VecDeque;
use std::fmt;

use serde_json::{Map, Value};

use crate::bus::{EventData, Handler};
use crate::page::PlaceholderRef;
use crate::registry::WidgetRegistry;
use crate::WidgetError;

/// One argument of a queued call.
#[derive(Clone)]
pub enum CallArg {
    Text(String),
    Value(Value),
    Handler(Handler),
    Element(PlaceholderRef),
}

impl fmt::Debug for CallArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
            Self::Element(_) => f.write_str("Element(..)"),
        }
    }
}

impl From<&str> for CallArg {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Value> for CallArg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Handler> for CallArg {
    fn from(handler: Handler) -> Self {
        Self::Handler(handler)
    }
}

/// A `(method, arguments)` pair recorded before start-up.
#[derive(Debug, Clone)]
pub struct DeferredCall {
    pub method: String,
    pub args: Vec<CallArg>,
}

impl DeferredCall {
    pub fn new(method: impl Into<String>, args: Vec<CallArg>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}

/// Outcome of draining a queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Calls dispatched to a registry method.
    pub dispatched: usize,
    /// Calls naming a method the registry does not have.
    pub ignored: usize,
    /// Calls to a known method whose arguments did not fit.
    pub failed: usize,
}

type Dispatch = fn(&WidgetRegistry, &mut Args) -> Result<(), WidgetError>;

/// Registry methods a queued call may name, including the listener-style
/// aliases of `on` and `off`.
const DISPATCH_TABLE: &[(&str, Dispatch)] = &[
    ("on", dispatch_on),
    ("addEventListener", dispatch_on),
    ("once", dispatch_once),
    ("off", dispatch_off),
    ("removeListener", dispatch_off),
    ("removeAllListeners", dispatch_off),
    ("removeEventListener", dispatch_off),
    ("emit", dispatch_emit),
    ("initialize", dispatch_initialize),
];

fn lookup(method: &str) -> Option<Dispatch> {
    DISPATCH_TABLE
        .iter()
        .find(|(name, _)| *name == method)
        .map(|(_, dispatch)| *dispatch)
}

/// Whether `method` names a replayable registry method.
pub fn is_known_method(method: &str) -> bool {
    lookup(method).is_some()
}

/// Pop every call off `queue` and apply it to `registry`, oldest first.
///
/// The queue is empty afterwards. A known method with unusable arguments
/// is logged and skipped; the rest of the queue still runs.
pub(crate) fn drain(registry: &WidgetRegistry, queue: &mut VecDeque<DeferredCall>) -> ReplayReport {
    let mut report = ReplayReport::default();

    while let Some(call) = queue.pop_front() {
        let Some(dispatch) = lookup(&call.method) else {
            report.ignored += 1;
            continue;
        };

        let mut args = Args::new(&call.method, call.args);
        match dispatch(registry, &mut args) {
            Ok(()) => report.dispatched += 1,
            Err(e) => {
                log::warn!("Skipping queued call: {}", e);
                report.failed += 1;
            }
        }
    }

    log::debug!(
        "Replayed queued calls: {} dispatched, {} ignored, {} failed",
        report.dispatched,
        report.ignored,
        report.failed
    );
    report
}

fn dispatch_on(registry: &WidgetRegistry, args: &mut Args) -> Result<(), WidgetError> {
    let event = args.event_name()?;
    let handler = args.handler()?;
    registry.on(&event, handler);
    Ok(())
}

fn dispatch_once(registry: &WidgetRegistry, args: &mut Args) -> Result<(), WidgetError> {
    let event = args.event_name()?;
    let handler = args.handler()?;
    registry.once(&event, handler);
    Ok(())
}

fn dispatch_off(registry: &WidgetRegistry, args: &mut Args) -> Result<(), WidgetError> {
    let event = args.event_name()?;
    let handler = args.optional_handler()?;
    registry.off(&event, handler.as_ref());
    Ok(())
}

fn dispatch_emit(registry: &WidgetRegistry, args: &mut Args) -> Result<(), WidgetError> {
    let event = args.event_name()?;
    let data = args.data()?;
    registry.emit(&event, &EventData::new(data));
    Ok(())
}

fn dispatch_initialize(registry: &WidgetRegistry, args: &mut Args) -> Result<(), WidgetError> {
    let element = args.element()?;
    registry.initialize(element.as_ref())?;
    Ok(())
}

/// Positional argument reader. Surplus arguments are ignored.
struct Args<'a> {
    method: &'a str,
    args: std::vec::IntoIter<CallArg>,
}

impl<'a> Args<'a> {
    fn new(method: &'a str, args: Vec<CallArg>) -> Self {
        Self {
            method,
            args: args.into_iter(),
        }
    }

    fn invalid(&self, reason: &str) -> WidgetError {
        WidgetError::invalid_call(self.method, reason)
    }

    fn event_name(&mut self) -> Result<String, WidgetError> {
        match self.args.next() {
            Some(CallArg::Text(name)) | Some(CallArg::Value(Value::String(name))) => Ok(name),
            _ => Err(self.invalid("expected an event name")),
        }
    }

    fn handler(&mut self) -> Result<Handler, WidgetError> {
        match self.args.next() {
            Some(CallArg::Handler(handler)) => Ok(handler),
            _ => Err(self.invalid("expected a handler")),
        }
    }

    fn optional_handler(&mut self) -> Result<Option<Handler>, WidgetError> {
        match self.args.next() {
            None | Some(CallArg::Value(Value::Null)) => Ok(None),
            Some(CallArg::Handler(handler)) => Ok(Some(handler)),
            _ => Err(self.invalid("expected a handler or nothing")),
        }
    }

    fn data(&mut self) -> Result<Map<String, Value>, WidgetError> {
        match self.args.next() {
            None | Some(CallArg::Value(Value::Null)) => Ok(Map::new()),
            Some(CallArg::Value(Value::Object(map))) => Ok(map),
            _ => Err(self.invalid("expected an object payload")),
        }
    }

    fn element(&mut self) -> Result<PlaceholderRef, WidgetError> {
        match self.args.next() {
            Some(CallArg::Element(element)) => Ok(element),
            _ => Err(self.invalid("expected a placeholder element")),
        }
    }
}
