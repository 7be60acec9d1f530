//! Seams between the agent logic and the embedded document.
//!
//! The agent never touches browser globals directly; everything it needs
//! from the platform comes through these traits. The wasm module provides
//! the real bindings, tests provide fakes.

use std::rc::Rc;

use arcadescan_bridge::{CanvasSize, Telemetry};
use serde_json::Value;

use crate::AgentError;

/// One scheduled animation-frame callback. Invoked with the frame timestamp
/// in milliseconds.
pub type FrameCallback = Box<dyn FnMut(f64)>;

/// The per-frame scheduling primitive as a callable value.
pub type ScheduleFn = Rc<dyn Fn(FrameCallback)>;

/// Mutable binding for the document's global frame-scheduling primitive.
/// The interceptor swaps the bound function and restores it later.
pub trait SchedulerSlot {
    fn get(&self) -> ScheduleFn;
    fn set(&self, f: ScheduleFn);
}

/// A console write function for one severity.
pub type ConsoleWriteFn = Rc<dyn Fn(&[Value])>;

/// Mutable bindings for the four standard logging severities.
pub trait ConsoleSlot {
    fn get(&self, level: arcadescan_bridge::ConsoleLevel) -> ConsoleWriteFn;
    fn set(&self, level: arcadescan_bridge::ConsoleLevel, f: ConsoleWriteFn);
}

/// An uncaught error as delivered by the global error hook.
#[derive(Clone, Debug)]
pub struct UncaughtError {
    pub message: String,
    pub source: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub stack: Option<String>,
}

pub type ErrorHandlerFn = Rc<dyn Fn(&UncaughtError)>;

/// Mutable binding for the document's global uncaught-error handler.
pub trait ErrorSlot {
    fn get(&self) -> Option<ErrorHandlerFn>;
    fn set(&self, handler: Option<ErrorHandlerFn>);
}

/// Injection marker on the embedded document. Once set, re-injection of the
/// whole agent is a no-op.
pub trait InjectionMarker {
    fn is_set(&self) -> bool;
    fn set(&self);
}

/// Read-only view of the document the agent observes.
pub trait DocumentHost {
    /// Monotonic time in milliseconds, same clock as the frame timestamps.
    fn now_ms(&self) -> f64;
    /// Intrinsic pixel size of a drawable surface, if one exists yet.
    fn surface(&self) -> Option<CanvasSize>;
    fn device_pixel_ratio(&self) -> f64;
    /// Re-dispatch a control as a custom event on both window and document.
    fn dispatch_custom_event(&self, name: &str) -> Result<(), AgentError>;
    /// Enumerate locally persisted key/value pairs.
    fn storage_entries(&self) -> Result<Vec<arcadescan_bridge::HighscoreEntry>, AgentError>;
}

/// Outbound half of the bridge as seen from inside the document.
pub trait TelemetrySink {
    fn emit(&self, message: Telemetry);
}
