//! Browser tests for the `HN` global.
//!
//! Run with `wasm-pack test --headless --firefox hn-button-wasm`.

#![cfg(target_arch = "wasm32")]

use js_sys::{Array, Function, Reflect, JSON};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_test::*;
use web_sys::{Document, Element};

wasm_bindgen_test_configure!(run_in_browser);

fn document() -> Document {
    web_sys::window().unwrap().document().unwrap()
}

/// A placeholder inside its own container, appended to the body.
fn placeholder(attrs: &[(&str, &str)]) -> (Element, Element) {
    let document = document();
    let container = document.create_element("div").unwrap();
    let element = document.create_element("a").unwrap();
    element.set_class_name("hn-button");
    for (name, value) in attrs {
        element.set_attribute(name, value).unwrap();
    }
    container.append_child(&element).unwrap();
    document.body().unwrap().append_child(&container).unwrap();
    (container, element)
}

fn hn() -> JsValue {
    hn_button_wasm::start().unwrap();
    let window = web_sys::window().unwrap();
    Reflect::get(&window, &"HN".into()).unwrap()
}

fn global(name: &str) -> JsValue {
    Reflect::get(&web_sys::window().unwrap(), &name.into()).unwrap()
}

fn set_global(name: &str, value: &JsValue) {
    Reflect::set(&web_sys::window().unwrap(), &name.into(), value).unwrap();
}

/// Let pending tasks such as `message` deliveries run.
async fn settle() {
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        web_sys::window()
            .unwrap()
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, 50)
            .unwrap();
    });
    wasm_bindgen_futures::JsFuture::from(promise).await.unwrap();
}

fn method(hn: &JsValue, name: &str) -> Function {
    Reflect::get(hn, &name.into()).unwrap().dyn_into().unwrap()
}

#[wasm_bindgen_test]
fn test_hn_exposes_api() {
    let hn = hn();
    for name in ["on", "once", "off", "emit", "initialize"] {
        assert!(
            Reflect::get(&hn, &name.into()).unwrap().is_function(),
            "HN.{} should be a function",
            name
        );
    }
}

#[wasm_bindgen_test]
fn test_initialize_replaces_anchor_with_iframe() {
    let hn = hn();
    let (container, element) = placeholder(&[("data-title", "T")]);

    method(&hn, "initialize").call1(&hn, &element).unwrap();

    let iframe = container
        .first_element_child()
        .expect("iframe should replace the anchor");
    assert_eq!(iframe.tag_name(), "IFRAME");
    assert!(element.parent_node().is_none());
    let src = iframe.get_attribute("src").unwrap();
    assert!(src.contains("?title=T"), "unexpected src {}", src);
}

#[wasm_bindgen_test]
fn test_start_converts_existing_placeholders() {
    let (container, element) = placeholder(&[("data-count", "vertical")]);
    hn();

    assert!(element.parent_node().is_none());
    let iframe = container.first_element_child().unwrap();
    assert_eq!(iframe.tag_name(), "IFRAME");
    assert_eq!(iframe.get_attribute("height").as_deref(), Some("62"));
}

#[wasm_bindgen_test]
fn test_emit_reaches_js_handler() {
    let hn = hn();
    let window = web_sys::window().unwrap();
    Reflect::set(&window, &"hnSeen".into(), &JsValue::NULL).unwrap();
    let handler = Function::new_with_args("data", "window.hnSeen = data.points;");

    method(&hn, "on").call2(&hn, &"vote".into(), &handler).unwrap();
    let data = js_sys::Object::new();
    Reflect::set(&data, &"points".into(), &JsValue::from(7)).unwrap();
    method(&hn, "emit").call2(&hn, &"vote".into(), &data).unwrap();

    let seen = Reflect::get(&window, &"hnSeen".into()).unwrap();
    assert_eq!(seen.as_f64(), Some(7.0));

    method(&hn, "off").call2(&hn, &"vote".into(), &handler).unwrap();
    Reflect::set(&window, &"hnSeen".into(), &JsValue::NULL).unwrap();
    method(&hn, "emit").call2(&hn, &"vote".into(), &data).unwrap();
    assert!(Reflect::get(&window, &"hnSeen".into()).unwrap().is_null());
}

#[wasm_bindgen_test]
fn test_queued_calls_replay_on_start() {
    set_global("hnQueuedCalls", &JsValue::from(0));
    let handler = Function::new_with_args(
        "data",
        "window.hnQueuedCalls += 1; window.hnQueuedV = data.v;",
    );
    let queue = Array::of3(
        &Array::of3(&"on".into(), &"queued".into(), &handler),
        &Array::of2(&"unknownMethod".into(), &"y".into()),
        &Array::of3(
            &"emit".into(),
            &"queued".into(),
            &JSON::parse(r#"{"v": 1}"#).unwrap(),
        ),
    );
    set_global("HN", &queue);

    let hn = hn();

    assert_eq!(global("hnQueuedCalls").as_f64(), Some(1.0));
    assert_eq!(global("hnQueuedV").as_f64(), Some(1.0));
    assert_eq!(queue.length(), 0);
    assert!(!Array::is_array(&hn));
    assert!(Reflect::get(&hn, &"on".into()).unwrap().is_function());
}

#[wasm_bindgen_test]
fn test_throwing_handler_does_not_stop_later_handlers() {
    let hn = hn();
    set_global("hnAfterThrow", &JsValue::FALSE);
    let thrower = Function::new_no_args("throw new Error('boom');");
    let later = Function::new_no_args("window.hnAfterThrow = true;");

    method(&hn, "on").call2(&hn, &"boom".into(), &thrower).unwrap();
    method(&hn, "on").call2(&hn, &"boom".into(), &later).unwrap();
    let emitted = method(&hn, "emit").call2(&hn, &"boom".into(), &js_sys::Object::new());

    assert!(emitted.is_ok());
    assert_eq!(global("hnAfterThrow").as_bool(), Some(true));
}

#[wasm_bindgen_test]
fn test_emit_hands_the_same_value_to_every_handler() {
    let hn = hn();
    set_global("hnPayloads", &Array::new());
    let first = Function::new_with_args("data", "window.hnPayloads.push(data);");
    let second = Function::new_with_args("data", "window.hnPayloads.push(data);");
    method(&hn, "on").call2(&hn, &"share".into(), &first).unwrap();
    method(&hn, "addEventListener")
        .call2(&hn, &"share".into(), &second)
        .unwrap();

    let data = js_sys::Object::new();
    Reflect::set(&data, &"cb".into(), &Function::new_no_args("")).unwrap();
    method(&hn, "emit").call2(&hn, &"share".into(), &data).unwrap();
    let list = Array::of2(&JsValue::from(1), &JsValue::from(2));
    method(&hn, "emit").call2(&hn, &"share".into(), &list).unwrap();

    let payloads: Array = global("hnPayloads").dyn_into().unwrap();
    assert_eq!(payloads.length(), 4);
    let data: &JsValue = &data;
    let list: &JsValue = &list;
    assert_eq!(&payloads.get(0), data);
    assert_eq!(&payloads.get(1), data);
    assert_eq!(&payloads.get(2), list);
    assert_eq!(&payloads.get(3), list);
}

#[wasm_bindgen_test]
async fn test_frame_message_resizes_and_targets_iframe() {
    let hn = hn();
    let window = web_sys::window().unwrap();
    let host = window.location().host().unwrap();
    let (container, element) = placeholder(&[("data-host", host.as_str())]);
    method(&hn, "initialize").call1(&hn, &element).unwrap();

    let iframe = container.first_element_child().unwrap();
    // Keep the frame from loading the test page itself.
    iframe.set_attribute("src", "about:blank").unwrap();
    let id = iframe.id();

    set_global("hnLoaded", &JsValue::NULL);
    let handler = Function::new_with_args("data", "window.hnLoaded = data;");
    method(&hn, "on").call2(&hn, &"load".into(), &handler).unwrap();

    let foreign = JSON::parse(r#"{"id": "hn-button-someone-else", "event": "load", "data": {"width": 10}}"#)
        .unwrap();
    window.post_message(&foreign, "*").unwrap();
    let payload = JSON::parse(&format!(
        r#"{{"id": "{id}", "event": "load", "data": {{"width": 83.2}}}}"#
    ))
    .unwrap();
    window.post_message(&payload, "*").unwrap();
    settle().await;

    assert_eq!(iframe.get_attribute("width").as_deref(), Some("84"));
    let loaded = global("hnLoaded");
    assert_eq!(Reflect::get(&loaded, &"id".into()).unwrap().as_string(), Some(id));
    assert_eq!(Reflect::get(&loaded, &"type".into()).unwrap().as_string().as_deref(), Some("load"));
    let target = Reflect::get(&loaded, &"target".into()).unwrap();
    let iframe: &JsValue = &iframe;
    assert_eq!(&target, iframe);
}
