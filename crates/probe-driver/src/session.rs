//! One attached page per probed entry.
//!
//! A [`ProbeSession`] owns a browser tab: it creates the target, attaches a
//! flattened CDP session, enables the Page and Runtime domains, and keeps a
//! background pump that turns protocol events into error counts. The
//! [`ProbeBrowser`] trait is the seam the probe algorithm tests against
//! without a browser.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::js;
use crate::keys::KeyToken;
use crate::transport::{CommandTarget, ProbeTransport};
use crate::ProbeError;

/// Page-level happenings the driver accounts for independently of the
/// agent's own telemetry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageEvent {
    /// `console.error` call observed via `Runtime.consoleAPICalled`.
    ConsoleError,
    /// Uncaught exception observed via `Runtime.exceptionThrown`.
    Exception,
    /// The renderer for this target went away.
    Crashed,
}

/// Browser operations the health probe needs.
#[async_trait]
pub trait ProbeBrowser: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), ProbeError>;

    /// Evaluate an expression in the page, returning its JSON value.
    /// `await_promise` resolves promise results before returning.
    async fn evaluate(&self, expression: &str, await_promise: bool) -> Result<Value, ProbeError>;

    /// Capture the visible viewport as PNG bytes.
    async fn capture_surface(&self) -> Result<Vec<u8>, ProbeError>;

    /// Synthesize a full key press (down then up).
    async fn dispatch_key(&self, key: &KeyToken) -> Result<(), ProbeError>;

    /// Driver-observed error count since the last [`reset_errors`] call.
    ///
    /// [`reset_errors`]: ProbeBrowser::reset_errors
    fn error_count(&self) -> u32;

    fn reset_errors(&self);
}

/// Real [`ProbeBrowser`] backed by a CDP transport.
pub struct ProbeSession {
    transport: Arc<dyn ProbeTransport>,
    session_id: String,
    target_id: String,
    errors: Arc<AtomicU32>,
    pump: JoinHandle<()>,
}

impl ProbeSession {
    /// Create a fresh tab and attach to it. The inbox collector is armed
    /// before any navigation so no telemetry posted during load is lost.
    pub async fn open(transport: Arc<dyn ProbeTransport>) -> Result<Self, ProbeError> {
        let created = transport
            .send_command(
                CommandTarget::Browser,
                "Target.createTarget",
                json!({ "url": "about:blank" }),
            )
            .await?;
        let target_id = created
            .get("targetId")
            .and_then(Value::as_str)
            .ok_or_else(|| ProbeError::Internal("createTarget returned no targetId".into()))?
            .to_string();

        let attached = transport
            .send_command(
                CommandTarget::Browser,
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session_id = attached
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| ProbeError::Internal("attachToTarget returned no sessionId".into()))?
            .to_string();

        let target = CommandTarget::Session(session_id.clone());
        transport
            .send_command(target.clone(), "Page.enable", json!({}))
            .await?;
        transport
            .send_command(target.clone(), "Runtime.enable", json!({}))
            .await?;
        transport
            .send_command(
                target.clone(),
                "Page.addScriptToEvaluateOnNewDocument",
                json!({ "source": js::INBOX_COLLECTOR }),
            )
            .await?;

        let errors = Arc::new(AtomicU32::new(0));
        let pump = Self::spawn_pump(transport.clone(), session_id.clone(), errors.clone());

        Ok(Self {
            transport,
            session_id,
            target_id,
            errors,
            pump,
        })
    }

    fn spawn_pump(
        transport: Arc<dyn ProbeTransport>,
        session_id: String,
        errors: Arc<AtomicU32>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = transport.next_event().await {
                if event.session_id.as_deref() != Some(session_id.as_str()) {
                    continue;
                }
                match Self::classify_event(&event.method, &event.params) {
                    Some(PageEvent::ConsoleError) | Some(PageEvent::Exception) => {
                        errors.fetch_add(1, Ordering::Relaxed);
                    }
                    Some(PageEvent::Crashed) => {
                        warn!(target: "probe-session", %session_id, "target crashed");
                        errors.fetch_add(1, Ordering::Relaxed);
                    }
                    None => {}
                }
            }
            debug!(target: "probe-session", %session_id, "event pump finished");
        })
    }

    fn classify_event(method: &str, params: &Value) -> Option<PageEvent> {
        match method {
            "Runtime.exceptionThrown" => Some(PageEvent::Exception),
            "Runtime.consoleAPICalled" => {
                let kind = params.get("type").and_then(Value::as_str)?;
                (kind == "error").then_some(PageEvent::ConsoleError)
            }
            "Inspector.targetCrashed" => Some(PageEvent::Crashed),
            _ => None,
        }
    }

    fn target(&self) -> CommandTarget {
        CommandTarget::Session(self.session_id.clone())
    }

    /// Close the tab. Errors are logged, not propagated; the next entry
    /// gets its own tab regardless.
    pub async fn close(&self) {
        let result = self
            .transport
            .send_command(
                CommandTarget::Browser,
                "Target.closeTarget",
                json!({ "targetId": self.target_id }),
            )
            .await;
        if let Err(err) = result {
            debug!(target: "probe-session", ?err, "failed to close target");
        }
    }
}

#[async_trait]
impl ProbeBrowser for ProbeSession {
    async fn navigate(&self, url: &str) -> Result<(), ProbeError> {
        let result = self
            .transport
            .send_command(self.target(), "Page.navigate", json!({ "url": url }))
            .await?;
        if let Some(error_text) = result.get("errorText").and_then(Value::as_str) {
            if !error_text.is_empty() {
                return Err(ProbeError::CdpIo(format!("navigation failed: {error_text}")));
            }
        }
        Ok(())
    }

    async fn evaluate(&self, expression: &str, await_promise: bool) -> Result<Value, ProbeError> {
        let result = self
            .transport
            .send_command(
                self.target(),
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": await_promise,
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let text = details
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or("unknown evaluation exception");
            return Err(ProbeError::Internal(format!("evaluate threw: {text}")));
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn capture_surface(&self) -> Result<Vec<u8>, ProbeError> {
        let result = self
            .transport
            .send_command(
                self.target(),
                "Page.captureScreenshot",
                json!({ "format": "png" }),
            )
            .await?;
        let data = result
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| ProbeError::Capture("captureScreenshot returned no data".into()))?;
        BASE64
            .decode(data)
            .map_err(|err| ProbeError::Capture(format!("screenshot base64 decode: {err}")))
    }

    async fn dispatch_key(&self, key: &KeyToken) -> Result<(), ProbeError> {
        for kind in ["keyDown", "keyUp"] {
            self.transport
                .send_command(
                    self.target(),
                    "Input.dispatchKeyEvent",
                    json!({
                        "type": kind,
                        "key": key.key,
                        "code": key.code,
                        "windowsVirtualKeyCode": key.key_code,
                        "nativeVirtualKeyCode": key.key_code,
                    }),
                )
                .await
                .map_err(|err| ProbeError::Dispatch(err.to_string()))?;
        }
        Ok(())
    }

    fn error_count(&self) -> u32 {
        self.errors.load(Ordering::Relaxed)
    }

    fn reset_errors(&self) {
        self.errors.store(0, Ordering::Relaxed);
    }
}

impl Drop for ProbeSession {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
