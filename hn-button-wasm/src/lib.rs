//! WebAssembly Hacker News button.
//!
//! Replaces `<a class="hn-button">` placeholders with cross-origin button
//! frames and relays the frames' events to page-level listeners.
//!
//! # Message Flow
//!
//! ```text
//! Host page (this crate)                         Button frame
//! ──────────────────────────────────────────────────────────────
//! 1. Scan for .hn-button placeholders
//! 2. Swap each for an <iframe> at
//!    <protocol>//<host>?title=..&url=..
//!                                   3. Render, measure content
//!    ◄──── postMessage({id, event: "load", data: {width}}) ────
//! 4. Check origin and id
//! 5. emit("load") → resize frame to ceil(width)
//!    ◄──── postMessage({id, event: "vote", data}) ────
//! 6. emit("vote") → page subscribers
//! ```
//!
//! # Modules
//!
//! - [`registry`] - Event hub, `load` policy, placeholder conversion
//! - [`instance`] - Per-frame identity and message validation
//! - [`replay`] - Calls queued before the module loaded
//! - [`bus`] - Publish/subscribe primitive
//! - [`page`] - Page adapter traits; [`memory`] is an in-memory adapter

pub mod bus;
pub mod error;
pub mod instance;
pub mod memory;
pub mod message;
pub mod options;
pub mod page;
pub mod registry;
pub mod replay;
pub mod settings;

#[cfg(target_arch = "wasm32")]
mod browser;

pub use bus::{EventBus, EventData, Handler, SubscriptionId};
pub use error::WidgetError;
pub use instance::WidgetInstance;
pub use message::{InboundMessage, MessagePayload, Rejection};
pub use options::ButtonOptions;
pub use page::{Frame, FrameRef, FrameSpec, Page, Placeholder, PlaceholderRef};
pub use registry::{WidgetRegistry, LOAD_EVENT};
pub use replay::{CallArg, DeferredCall, ReplayReport};
pub use settings::Settings;

#[cfg(target_arch = "wasm32")]
pub use browser::{start, JsWidgetRegistry};
