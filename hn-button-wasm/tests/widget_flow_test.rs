//! Widget Flow Tests
//!
//! End-to-end runs against the in-memory page adapter:
//! - Start-up order (scan, then replay)
//! - Frame swap and frame URL
//! - Message relay across several buttons
//! - Resize on `load`

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use hn_button_wasm::memory::MemoryPage;
use hn_button_wasm::{
    CallArg, DeferredCall, EventData, Frame, Handler, MessagePayload, Settings, WidgetRegistry,
};
use serde_json::{json, Map, Value};

const ORIGIN: &str = "https://hn-button.herokuapp.com";

fn blog_page() -> Rc<MemoryPage> {
    Rc::new(MemoryPage::new(
        "https:",
        "Writing a button in Rust",
        "https://blog.example/rust-button",
    ))
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

fn payload(id: &str, event: &str, data: Value) -> MessagePayload {
    MessagePayload {
        id: id.to_string(),
        event: event.to_string(),
        data: object(data),
    }
}

fn recording_handler() -> (Rc<RefCell<Vec<EventData>>>, Handler) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let handler: Handler = Rc::new(move |data: &EventData| sink.borrow_mut().push(data.clone()));
    (seen, handler)
}

/// Placeholders convert to frames with the expected URL and size.
#[test]
fn test_start_converts_placeholders() {
    let page = blog_page();
    page.add_placeholder("hn-button", &[("data-count", "vertical")]);
    page.add_placeholder(
        "hn-button",
        &[
            ("data-title", "Custom title"),
            ("data-url", "https://news.example/item?id=1"),
            ("data-host", "localhost:5000"),
        ],
    );

    let mut queue = VecDeque::new();
    let (registry, report) =
        WidgetRegistry::start(page.clone(), Settings::default(), &mut queue).unwrap();

    assert_eq!(report.dispatched, 0);
    assert_eq!(page.placeholders_remaining(), 0);

    let frames = page.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].spec().height, 62);
    assert_eq!(
        frames[0].spec().src,
        "https://hn-button.herokuapp.com?title=Writing%20a%20button%20in%20Rust&url=https%3A%2F%2Fblog.example%2Frust-button&count=vertical"
    );
    assert_eq!(frames[1].spec().height, 20);
    assert_eq!(
        frames[1].spec().src,
        "https://localhost:5000?title=Custom%20title&url=https%3A%2F%2Fnews.example%2Fitem%3Fid%3D1"
    );
    assert_eq!(frames[1].spec().data_attribute("data-host"), None);

    let ids = registry.instance_ids();
    assert_eq!(frames[0].name(), ids[0]);
    assert_eq!(frames[1].name(), ids[1]);
}

/// Queued subscriptions see events relayed after start-up.
#[test]
fn test_queued_handlers_receive_relayed_events() {
    let page = blog_page();
    page.add_placeholder("hn-button", &[]);
    let (votes, on_vote) = recording_handler();

    let mut queue = VecDeque::from(vec![
        DeferredCall::new("on", vec![CallArg::from("vote"), CallArg::from(on_vote)]),
        DeferredCall::new("track", vec![CallArg::from("pageview")]),
    ]);
    let (registry, report) =
        WidgetRegistry::start(page.clone(), Settings::default(), &mut queue).unwrap();
    assert_eq!((report.dispatched, report.ignored), (1, 1));

    let id = registry.instance_ids().remove(0);
    page.post_message(ORIGIN, payload(&id, "vote", json!({"points": 101})));

    let votes = votes.borrow();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].event_type(), Some("vote"));
    assert_eq!(votes[0].id(), Some(id.as_str()));
    assert_eq!(votes[0].get("points"), Some(&json!(101)));
    assert_eq!(votes[0].target.as_ref().map(|frame| frame.name()), Some(id));
}

/// Each message reaches exactly the instance it names.
#[test]
fn test_messages_are_routed_to_one_instance() {
    let page = blog_page();
    for _ in 0..3 {
        page.add_placeholder("hn-button", &[]);
    }
    let registry = WidgetRegistry::new(page.clone(), Settings::default());
    registry.scan();
    let (seen, handler) = recording_handler();
    registry.on("vote", handler);

    let ids = registry.instance_ids();
    for id in &ids {
        // Every instance listens on the shared channel.
        assert_eq!(page.post_message(ORIGIN, payload(id, "vote", json!({}))), 3);
    }

    let seen = seen.borrow();
    let relayed: Vec<&str> = seen.iter().filter_map(EventData::id).collect();
    let expected: Vec<&str> = ids.iter().map(String::as_str).collect();
    assert_eq!(relayed, expected);
}

/// Foreign traffic on the shared channel never reaches subscribers.
#[test]
fn test_foreign_traffic_is_dropped() {
    let page = blog_page();
    page.add_placeholder("hn-button", &[]);
    let registry = WidgetRegistry::new(page.clone(), Settings::default());
    registry.scan();
    let id = registry.instance_ids().remove(0);
    let (seen, handler) = recording_handler();
    registry.on("vote", handler);

    page.post_json("https://ads.example", r#"{"slot": 3}"#);
    page.post_json("https://evil.example", &format!(r#"{{"id": "{id}", "event": "vote"}}"#));
    page.post_json(ORIGIN, r#"{"id": "hn-button-guess", "event": "vote"}"#);
    assert!(seen.borrow().is_empty());

    page.post_json(ORIGIN, &format!(r#"{{"id": "{id}", "event": "vote"}}"#));
    assert_eq!(seen.borrow().len(), 1);
}

/// `load` resizes only the frame that sent it.
#[test]
fn test_load_resizes_sender_only() {
    let page = blog_page();
    page.add_placeholder("hn-button", &[]);
    page.add_placeholder("hn-button", &[]);
    let registry = WidgetRegistry::new(page.clone(), Settings::default());
    registry.scan();
    let ids = registry.instance_ids();

    page.post_message(ORIGIN, payload(&ids[1], "load", json!({"width": 83.2})));

    assert_eq!(page.frame(&ids[0]).unwrap().width(), 100);
    assert_eq!(page.frame(&ids[1]).unwrap().width(), 84);
}

/// Rapid initialization never reuses an id.
#[test]
fn test_many_buttons_have_distinct_ids() {
    let page = blog_page();
    let registry = WidgetRegistry::new(page.clone(), Settings::default());

    let ids: Vec<String> = (0..200)
        .map(|_| {
            let element = page.add_placeholder("hn-button", &[]);
            registry.initialize(&*element).unwrap()
        })
        .collect();

    let distinct: HashSet<&String> = ids.iter().collect();
    assert_eq!(distinct.len(), ids.len());
}

/// Custom settings flow through to frames and ids.
#[test]
fn test_custom_settings() {
    let page = blog_page();
    page.add_placeholder("vote-here", &[]);
    let settings = Settings::from_json(
        r#"{"marker_class": "vote-here", "id_prefix": "vote", "default_host": "votes.example", "initial_width": 60}"#,
    )
    .unwrap();
    let registry = WidgetRegistry::new(page.clone(), settings);

    assert_eq!(registry.scan(), 1);
    let id = registry.instance_ids().remove(0);
    assert!(id.starts_with("vote-"));

    let frame = page.frame(&id).unwrap();
    assert_eq!(frame.width(), 60);
    assert_eq!(frame.spec().class_name, "vote-here");
    assert!(frame.spec().src.starts_with("https://votes.example?"));
}
