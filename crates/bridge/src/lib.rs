//! Telemetry/control bridge between the in-document agent and the host.
//!
//! The bridge is a minimal, origin-locked, fire-and-forget messaging
//! contract: every message carries a `source` tag naming the side that
//! produced it, and either side silently discards messages whose tag or
//! origin does not match the expected counterpart. No message requires an
//! acknowledgement; the readiness and pause-state echoes are the only
//! response-shaped patterns and both are safe to miss.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// `source` tag stamped on every message produced by the embedded agent.
pub const AGENT_TAG: &str = "arcade-agent";
/// `source` tag stamped on every control message produced by the host.
pub const HOST_TAG: &str = "arcade-host";

/// Raw wire envelope shared by both directions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub source: String,
    #[serde(rename = "type")]
    pub channel: String,
    #[serde(default)]
    pub payload: Value,
}

/// Why an incoming envelope was discarded. Discards are not error
/// conditions; callers log them at debug level at most.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum Dropped {
    #[error("sender origin does not match embedding origin")]
    ForeignOrigin,
    #[error("source tag does not match expected counterpart")]
    ForeignTag,
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
    #[error("malformed payload on channel {channel}: {detail}")]
    Malformed { channel: String, detail: String },
}

/// Console severity levels the agent intercepts.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
}

/// Intrinsic pixel dimensions of the discovered rendering surface.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

/// Payload of the one-shot `ready` message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadyPayload {
    pub canvas: CanvasSize,
    pub device_pixel_ratio: f64,
}

/// Rolling frame-rate telemetry, emitted at most once per ~100ms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub fps: f64,
    pub frame_time_ms: f64,
    pub frame_samples: u64,
    pub canvas_size: Option<CanvasSize>,
    pub first_paint_ms: Option<f64>,
    pub device_pixel_ratio: f64,
}

/// Forwarded console invocation, args best-effort serialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsolePayload {
    pub level: ConsoleLevel,
    pub args: Vec<Value>,
}

/// Forwarded uncaught error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
    #[serde(default)]
    pub stack: Option<String>,
}

/// Applied pause state, echoed after every focus/blur/pause/resume control.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PauseStatePayload {
    pub paused: bool,
}

/// Locally persisted key/value pairs found in the embedded document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HighscoresPayload {
    pub entries: Vec<HighscoreEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HighscoreEntry {
    pub key: String,
    pub value: String,
}

/// Decoded telemetry message, agent → host.
#[derive(Clone, Debug, PartialEq)]
pub enum Telemetry {
    Ready(ReadyPayload),
    Metrics(MetricsSample),
    Console(ConsolePayload),
    Error(ErrorPayload),
    PauseState(PauseStatePayload),
    Highscores(HighscoresPayload),
}

impl Telemetry {
    pub fn channel(&self) -> &'static str {
        match self {
            Telemetry::Ready(_) => "ready",
            Telemetry::Metrics(_) => "metrics",
            Telemetry::Console(_) => "console",
            Telemetry::Error(_) => "error",
            Telemetry::PauseState(_) => "pause-state",
            Telemetry::Highscores(_) => "highscores",
        }
    }
}

/// Control message, host → agent.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Control {
    Focus,
    Blur,
    Pause,
    Resume,
    ToggleHelp,
    RequestHighscores,
}

impl Control {
    pub fn channel(&self) -> &'static str {
        match self {
            Control::Focus => "focus",
            Control::Blur => "blur",
            Control::Pause => "pause",
            Control::Resume => "resume",
            Control::ToggleHelp => "toggle-help",
            Control::RequestHighscores => "request-highscores",
        }
    }
}

fn payload<T: for<'de> Deserialize<'de>>(envelope: &Envelope) -> Result<T, Dropped> {
    serde_json::from_value(envelope.payload.clone()).map_err(|err| Dropped::Malformed {
        channel: envelope.channel.clone(),
        detail: err.to_string(),
    })
}

/// Decode a telemetry envelope received by the host.
///
/// `sender_origin` is the origin the platform reported for the message,
/// `embed_origin` the origin of the embedding page. Anything that is not a
/// well-formed agent message from the same origin is dropped.
pub fn decode_telemetry(
    envelope: &Envelope,
    sender_origin: &str,
    embed_origin: &str,
) -> Result<Telemetry, Dropped> {
    if sender_origin != embed_origin {
        return Err(Dropped::ForeignOrigin);
    }
    if envelope.source != AGENT_TAG {
        return Err(Dropped::ForeignTag);
    }
    match envelope.channel.as_str() {
        "ready" => Ok(Telemetry::Ready(payload(envelope)?)),
        "metrics" => Ok(Telemetry::Metrics(payload(envelope)?)),
        "console" => Ok(Telemetry::Console(payload(envelope)?)),
        "error" => Ok(Telemetry::Error(payload(envelope)?)),
        "pause-state" => Ok(Telemetry::PauseState(payload(envelope)?)),
        "highscores" => Ok(Telemetry::Highscores(payload(envelope)?)),
        other => Err(Dropped::UnknownChannel(other.to_string())),
    }
}

/// Decode a control envelope received by the agent. Same filtering rules,
/// opposite expected tag.
pub fn decode_control(
    envelope: &Envelope,
    sender_origin: &str,
    embed_origin: &str,
) -> Result<Control, Dropped> {
    if sender_origin != embed_origin {
        return Err(Dropped::ForeignOrigin);
    }
    if envelope.source != HOST_TAG {
        return Err(Dropped::ForeignTag);
    }
    match envelope.channel.as_str() {
        "focus" => Ok(Control::Focus),
        "blur" => Ok(Control::Blur),
        "pause" => Ok(Control::Pause),
        "resume" => Ok(Control::Resume),
        "toggle-help" => Ok(Control::ToggleHelp),
        "request-highscores" => Ok(Control::RequestHighscores),
        other => Err(Dropped::UnknownChannel(other.to_string())),
    }
}

/// Encode a telemetry message for the wire, stamped with the agent tag.
pub fn encode_telemetry(message: &Telemetry) -> Envelope {
    let payload = match message {
        Telemetry::Ready(p) => serde_json::to_value(p),
        Telemetry::Metrics(p) => serde_json::to_value(p),
        Telemetry::Console(p) => serde_json::to_value(p),
        Telemetry::Error(p) => serde_json::to_value(p),
        Telemetry::PauseState(p) => serde_json::to_value(p),
        Telemetry::Highscores(p) => serde_json::to_value(p),
    }
    .unwrap_or(Value::Null);

    Envelope {
        source: AGENT_TAG.to_string(),
        channel: message.channel().to_string(),
        payload,
    }
}

/// Encode a control message for the wire, stamped with the host tag.
pub fn encode_control(control: Control) -> Envelope {
    Envelope {
        source: HOST_TAG.to_string(),
        channel: control.channel().to_string(),
        payload: Value::Null,
    }
}
