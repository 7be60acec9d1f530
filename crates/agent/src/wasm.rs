//! Browser bindings for the agent.
//!
//! Compiled only for `wasm32`; this module adapts the platform traits to
//! the real document globals and exposes [`install_agent`] as the script
//! entry point the serving endpoint loads into each embedded document.

use std::cell::RefCell;
use std::rc::Rc;

use arcadescan_bridge::{
    decode_control, encode_telemetry, ConsoleLevel, Envelope, HighscoreEntry, Telemetry,
};
use js_sys::{Function, Reflect};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::platform::{
    ConsoleSlot, ConsoleWriteFn, DocumentHost, ErrorHandlerFn, ErrorSlot, FrameCallback,
    InjectionMarker, ScheduleFn, SchedulerSlot, TelemetrySink, UncaughtError,
};
use crate::serialize::{serialize_error, CaughtError};
use crate::{Agent, AgentError};

const MARKER_PROP: &str = "__arcadescanAgent";

fn window() -> Option<web_sys::Window> {
    web_sys::window()
}

/// Convert one console argument to its wire value: primitives pass
/// through, errors become `{name, message, stack}`, everything else is
/// structurally cloned via JSON, with string coercion as the last resort.
fn js_arg_to_value(arg: &JsValue) -> Value {
    if arg.is_null() || arg.is_undefined() {
        return Value::Null;
    }
    if let Some(b) = arg.as_bool() {
        return Value::Bool(b);
    }
    if let Some(s) = arg.as_string() {
        return Value::String(s);
    }
    if let Some(n) = arg.as_f64() {
        return serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Some(err) = arg.dyn_ref::<js_sys::Error>() {
        return serialize_error(&CaughtError {
            name: String::from(err.name()),
            message: String::from(err.message()),
            stack: Reflect::get(err.as_ref(), &JsValue::from_str("stack"))
                .ok()
                .and_then(|v| v.as_string()),
        });
    }
    match js_sys::JSON::stringify(arg) {
        Ok(text) => text
            .as_string()
            .and_then(|t| serde_json::from_str(&t).ok())
            .unwrap_or_else(|| Value::String(format!("{arg:?}"))),
        Err(_) => Value::String(format!("{arg:?}")),
    }
}

fn value_to_js(value: &Value) -> JsValue {
    js_sys::JSON::parse(&value.to_string()).unwrap_or(JsValue::NULL)
}

struct WebMarker {
    window: web_sys::Window,
}

impl InjectionMarker for WebMarker {
    fn is_set(&self) -> bool {
        Reflect::get(self.window.as_ref(), &JsValue::from_str(MARKER_PROP))
            .map(|v| v.is_truthy())
            .unwrap_or(false)
    }

    fn set(&self) {
        let _ = Reflect::set(
            self.window.as_ref(),
            &JsValue::from_str(MARKER_PROP),
            &JsValue::TRUE,
        );
    }
}

struct WebSchedulerSlot {
    window: web_sys::Window,
}

impl SchedulerSlot for WebSchedulerSlot {
    fn get(&self) -> ScheduleFn {
        let window = self.window.clone();
        let raf = Reflect::get(window.as_ref(), &JsValue::from_str("requestAnimationFrame"))
            .ok()
            .and_then(|v| v.dyn_into::<Function>().ok());
        Rc::new(move |cb: FrameCallback| {
            let Some(raf) = raf.as_ref() else { return };
            let mut cb = cb;
            let closure = Closure::once(move |ts: f64| cb(ts));
            let _ = raf.call1(window.as_ref(), closure.as_ref().unchecked_ref());
            closure.forget();
        })
    }

    fn set(&self, f: ScheduleFn) {
        let closure = Closure::wrap(Box::new(move |cb: Function| {
            let cb = cb.clone();
            f(Box::new(move |ts: f64| {
                let _ = cb.call1(&JsValue::NULL, &JsValue::from_f64(ts));
            }));
        }) as Box<dyn FnMut(Function)>);
        let _ = Reflect::set(
            self.window.as_ref(),
            &JsValue::from_str("requestAnimationFrame"),
            closure.as_ref().unchecked_ref(),
        );
        closure.forget();
    }
}

struct WebConsoleSlot {
    console: js_sys::Object,
}

impl WebConsoleSlot {
    fn method_name(level: ConsoleLevel) -> &'static str {
        match level {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
        }
    }
}

impl ConsoleSlot for WebConsoleSlot {
    fn get(&self, level: ConsoleLevel) -> ConsoleWriteFn {
        let console = self.console.clone();
        let original = Reflect::get(&console, &JsValue::from_str(Self::method_name(level)))
            .ok()
            .and_then(|v| v.dyn_into::<Function>().ok());
        Rc::new(move |args: &[Value]| {
            let Some(original) = original.as_ref() else { return };
            let js_args = js_sys::Array::new();
            for arg in args {
                js_args.push(&value_to_js(arg));
            }
            let _ = original.apply(&console, &js_args);
        })
    }

    fn set(&self, level: ConsoleLevel, f: ConsoleWriteFn) {
        let closure = Closure::wrap(Box::new(move |a: JsValue, b: JsValue, c: JsValue, d: JsValue| {
            let mut args = Vec::new();
            for raw in [&a, &b, &c, &d] {
                if !raw.is_undefined() {
                    args.push(js_arg_to_value(raw));
                }
            }
            f(&args);
        }) as Box<dyn FnMut(JsValue, JsValue, JsValue, JsValue)>);
        let _ = Reflect::set(
            &self.console,
            &JsValue::from_str(Self::method_name(level)),
            closure.as_ref().unchecked_ref(),
        );
        closure.forget();
    }
}

struct WebErrorSlot {
    window: web_sys::Window,
}

impl ErrorSlot for WebErrorSlot {
    fn get(&self) -> Option<ErrorHandlerFn> {
        // A pre-existing JS onerror handler is not representable here; it
        // is preserved and delegated to inside `set` instead.
        None
    }

    fn set(&self, handler: Option<ErrorHandlerFn>) {
        let Some(handler) = handler else {
            let _ = Reflect::set(
                self.window.as_ref(),
                &JsValue::from_str("onerror"),
                &JsValue::NULL,
            );
            return;
        };
        let previous = Reflect::get(self.window.as_ref(), &JsValue::from_str("onerror"))
            .ok()
            .and_then(|v| v.dyn_into::<Function>().ok());
        let closure = Closure::wrap(Box::new(
            move |message: JsValue, source: JsValue, line: JsValue, column: JsValue, error: JsValue| {
                handler(&UncaughtError {
                    message: message.as_string().unwrap_or_default(),
                    source: source.as_string(),
                    line: line.as_f64().map(|n| n as u32),
                    column: column.as_f64().map(|n| n as u32),
                    stack: error
                        .dyn_ref::<js_sys::Error>()
                        .and_then(|e| Reflect::get(e.as_ref(), &JsValue::from_str("stack")).ok())
                        .and_then(|v| v.as_string()),
                });
                if let Some(prev) = previous.as_ref() {
                    let args = js_sys::Array::of5(&message, &source, &line, &column, &error);
                    let _ = prev.apply(&JsValue::NULL, &args);
                }
                // Never suppress the default error reporting.
                JsValue::FALSE
            },
        )
            as Box<dyn FnMut(JsValue, JsValue, JsValue, JsValue, JsValue) -> JsValue>);
        let _ = Reflect::set(
            self.window.as_ref(),
            &JsValue::from_str("onerror"),
            closure.as_ref().unchecked_ref(),
        );
        closure.forget();
    }
}

struct WebDocumentHost {
    window: web_sys::Window,
}

impl DocumentHost for WebDocumentHost {
    fn now_ms(&self) -> f64 {
        self.window
            .performance()
            .map(|p| p.now())
            .unwrap_or(0.0)
    }

    fn surface(&self) -> Option<arcadescan_bridge::CanvasSize> {
        let document = self.window.document()?;
        let element = document.query_selector("canvas").ok().flatten()?;
        let canvas: web_sys::HtmlCanvasElement = element.dyn_into().ok()?;
        Some(arcadescan_bridge::CanvasSize {
            width: canvas.width(),
            height: canvas.height(),
        })
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.window.device_pixel_ratio()
    }

    fn dispatch_custom_event(&self, name: &str) -> Result<(), AgentError> {
        let document = self
            .window
            .document()
            .ok_or_else(|| AgentError::Dispatch("no document".into()))?;
        // Two instances: a single event cannot be dispatched twice.
        for target in [self.window.unchecked_ref::<web_sys::EventTarget>(), document.unchecked_ref()] {
            let event = web_sys::CustomEvent::new(name)
                .map_err(|_| AgentError::Dispatch(format!("CustomEvent({name})")))?;
            target
                .dispatch_event(&event)
                .map_err(|_| AgentError::Dispatch(format!("dispatch {name}")))?;
        }
        Ok(())
    }

    fn storage_entries(&self) -> Result<Vec<HighscoreEntry>, AgentError> {
        let storage = self
            .window
            .local_storage()
            .map_err(|_| AgentError::Storage("localStorage access denied".into()))?
            .ok_or_else(|| AgentError::Storage("localStorage unavailable".into()))?;
        let len = storage
            .length()
            .map_err(|_| AgentError::Storage("length() failed".into()))?;
        let mut entries = Vec::with_capacity(len as usize);
        for i in 0..len {
            let Ok(Some(key)) = storage.key(i) else { continue };
            let Ok(Some(value)) = storage.get_item(&key) else { continue };
            entries.push(HighscoreEntry { key, value });
        }
        Ok(entries)
    }
}

/// Posts envelopes to the embedding context, locked to our own origin.
struct PostMessageSink {
    window: web_sys::Window,
    origin: String,
}

impl TelemetrySink for PostMessageSink {
    fn emit(&self, message: Telemetry) {
        let envelope = encode_telemetry(&message);
        let Ok(json) = serde_json::to_string(&envelope) else {
            return;
        };
        if let Ok(Some(parent)) = self.window.parent() {
            let _ = parent.post_message(&JsValue::from_str(&json), &self.origin);
        }
    }
}

/// Script entry point. Safe to call more than once; re-injection is a
/// no-op once the marker is present.
#[wasm_bindgen]
pub fn install_agent() {
    let Some(win) = window() else { return };
    let origin = win
        .location()
        .origin()
        .unwrap_or_else(|_| "null".to_string());

    let marker = WebMarker { window: win.clone() };
    let scheduler = WebSchedulerSlot { window: win.clone() };
    let console_slot = WebConsoleSlot {
        console: match Reflect::get(win.as_ref(), &JsValue::from_str("console"))
            .ok()
            .and_then(|v| v.dyn_into::<js_sys::Object>().ok())
        {
            Some(obj) => obj,
            None => return,
        },
    };
    let error_slot = WebErrorSlot { window: win.clone() };
    let host = Rc::new(WebDocumentHost { window: win.clone() });
    let sink = Rc::new(PostMessageSink {
        window: win.clone(),
        origin: origin.clone(),
    });

    let Some(agent) = Agent::inject(host, sink, &marker, &scheduler, &console_slot, &error_slot)
    else {
        return;
    };
    let agent = Rc::new(agent);

    // Readiness trigger 1: document mutations.
    {
        let agent = agent.clone();
        let observer_cb = Closure::wrap(Box::new(move |_: JsValue, _: JsValue| {
            agent.on_mutation();
        }) as Box<dyn FnMut(JsValue, JsValue)>);
        if let Ok(observer) =
            web_sys::MutationObserver::new(observer_cb.as_ref().unchecked_ref())
        {
            if let Some(document) = win.document() {
                let init = web_sys::MutationObserverInit::new();
                init.set_child_list(true);
                init.set_subtree(true);
                let _ = observer.observe_with_options(&document, &init);
            }
        }
        observer_cb.forget();
    }

    // Readiness trigger 2: load event.
    {
        let agent = agent.clone();
        let on_load = Closure::wrap(Box::new(move || agent.on_load()) as Box<dyn FnMut()>);
        let _ = win.add_event_listener_with_callback("load", on_load.as_ref().unchecked_ref());
        on_load.forget();
    }

    // Readiness trigger 3: zero-delay fallback timer.
    {
        let agent = agent.clone();
        let timer = Closure::wrap(Box::new(move || agent.on_fallback_timer()) as Box<dyn FnMut()>);
        let _ = win
            .set_timeout_with_callback_and_timeout_and_arguments_0(timer.as_ref().unchecked_ref(), 0);
        timer.forget();
    }

    // Control channel: host → agent messages.
    {
        let agent = agent.clone();
        let embed_origin = origin;
        let on_message = Closure::wrap(Box::new(move |event: web_sys::MessageEvent| {
            let Some(text) = event.data().as_string() else {
                return;
            };
            let Ok(envelope) = serde_json::from_str::<Envelope>(&text) else {
                return;
            };
            if let Ok(control) = decode_control(&envelope, &event.origin(), &embed_origin) {
                agent.handle_control(control);
            }
        }) as Box<dyn FnMut(web_sys::MessageEvent)>);
        let _ = win.add_event_listener_with_callback("message", on_message.as_ref().unchecked_ref());
        on_message.forget();
    }
}
