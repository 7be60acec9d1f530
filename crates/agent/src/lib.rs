//! In-document telemetry agent.
//!
//! The agent makes an uncooperative rendering program observable without
//! altering its behaviour: it wraps the per-frame scheduling primitive, the
//! four console severities and the uncaught-error hook, emits a one-shot
//! readiness signal when a drawable surface appears, and answers host
//! control messages over the bridge.
//!
//! The logic is written against the platform traits in [`platform`] so it
//! runs (and is tested) without a real document. On `wasm32` the [`wasm`]
//! module binds those traits to the actual browser globals and the crate
//! ships into the embedded document as a same-origin script.

pub mod context;
pub mod interceptor;
pub mod platform;
pub mod serialize;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

mod agent;

pub use agent::Agent;
pub use context::{AgentContext, Tuning};

use thiserror::Error;

/// Failures inside the agent. These are reported over the bridge as `error`
/// telemetry, never thrown into the embedded program's own execution.
#[derive(Clone, Debug, Error)]
pub enum AgentError {
    #[error("storage unavailable: {0}")]
    Storage(String),
    #[error("event dispatch failed: {0}")]
    Dispatch(String),
}
