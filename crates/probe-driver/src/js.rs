//! Host-side JavaScript evaluated over CDP.
//!
//! These snippets run in the probed document, not in the agent. They cover
//! the driver's own responsibilities: collecting agent telemetry posted to
//! the embedding window, probing the DOM when readiness never arrives, and
//! independently counting animation ticks so the verdict does not rest on
//! agent self-reporting alone.

/// Installed via `Page.addScriptToEvaluateOnNewDocument` before navigation.
/// Buffers every `message` event payload so the driver can drain telemetry
/// with plain polling instead of a CDP binding.
pub const INBOX_COLLECTOR: &str = r#"
(() => {
  if (window.__arcadescanInbox) { return; }
  window.__arcadescanInbox = [];
  window.addEventListener('message', (event) => {
    const data = typeof event.data === 'string' ? event.data : JSON.stringify(event.data);
    window.__arcadescanInbox.push({ origin: event.origin, data });
    if (window.__arcadescanInbox.length > 4096) {
      window.__arcadescanInbox.shift();
    }
  });
})()
"#;

/// Removes and returns all buffered telemetry envelopes as a JSON array.
pub const DRAIN_INBOX: &str = r#"
(() => {
  const inbox = window.__arcadescanInbox || [];
  return JSON.stringify(inbox.splice(0, inbox.length));
})()
"#;

/// Fallback readiness check: is there a canvas with a non-zero backing
/// store anywhere in the document?
pub const CANVAS_FALLBACK: &str = r#"
(() => {
  const canvas = document.querySelector('canvas');
  if (!canvas) { return JSON.stringify({ found: false }); }
  return JSON.stringify({ found: true, width: canvas.width, height: canvas.height });
})()
"#;

/// Reports the document's own origin so inbound envelopes can be checked
/// against it.
pub const DOCUMENT_ORIGIN: &str = "window.location.origin";

/// Counts `requestAnimationFrame` ticks over a fixed window. Evaluated with
/// `awaitPromise` so the call resolves only once the window has elapsed.
pub fn tick_window_expr(window_ms: u64) -> String {
    format!(
        r#"
new Promise((resolve) => {{
  let ticks = 0;
  const tally = () => {{ ticks += 1; requestAnimationFrame(tally); }};
  requestAnimationFrame(tally);
  setTimeout(() => resolve(ticks), {window_ms});
}})
"#
    )
}

/// Posts a host control envelope into the document's own window, which is
/// where the agent listens.
pub fn post_control_expr(envelope_json: &str) -> String {
    let literal =
        serde_json::to_string(envelope_json).unwrap_or_else(|_| "\"\"".to_string());
    format!("window.postMessage({literal}, window.location.origin)")
}
