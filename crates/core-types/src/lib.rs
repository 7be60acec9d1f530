//! Shared data model for the arcadescan health scanner.
//!
//! Everything the library crates exchange lives here so that the bridge,
//! probe driver and classifier can depend on one dependency-light crate
//! instead of on each other.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier of one game entry in the persisted manifest.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one scan run, carried into logs and reports.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ScanRunId(pub Uuid);

impl ScanRunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScanRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScanRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted health classification of an entry.
///
/// Persisted status is external state owned by the manifest; the scanner only
/// ever proposes transitions into [`Status::Broken`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Working,
    Broken,
    MissingAssets,
    Unknown,
    Flaky,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Working => "working",
            Status::Broken => "broken",
            Status::MissingAssets => "missing-assets",
            Status::Unknown => "unknown",
            Status::Flaky => "flaky",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, Error)]
#[error("unknown status: {0}")]
pub struct ParseStatusError(String);

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "working" => Ok(Status::Working),
            "broken" => Ok(Status::Broken),
            "missing-assets" => Ok(Status::MissingAssets),
            "unknown" => Ok(Status::Unknown),
            "flaky" => Ok(Status::Flaky),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// One declared control of a game, e.g. `{ action: "move", input: "Left/Right" }`.
///
/// `input` is free text written by game authors; the probe driver derives a
/// representative key from it on a best-effort basis.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControlBinding {
    pub action: String,
    pub input: String,
}

/// Declared control groups for a game entry.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Controls {
    #[serde(default)]
    pub movement: Vec<ControlBinding>,
}

/// One entry of the persisted manifest, as far as the scanner reads it.
///
/// The manifest schema is owned by the hosting page; fields the scanner does
/// not interpret are preserved verbatim in `extra` so a status write-back
/// never loses them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameEntry {
    pub id: EntryId,
    pub title: String,
    pub status: Status,
    #[serde(default)]
    pub controls: Controls,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GameEntry {
    /// First declared movement input, if any.
    pub fn movement_input(&self) -> Option<&str> {
        self.controls
            .movement
            .first()
            .map(|binding| binding.input.as_str())
    }
}

/// Black-box evidence gathered by the probe driver for one entry.
///
/// The driver fills this in conservatively: any capture or dispatch failure
/// is recorded as failing evidence, never silently skipped. The classifier
/// consumes it as-is.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProbeEvidence {
    pub id: EntryId,
    /// Readiness signal was observed (agent or DOM fallback) before timeout.
    pub ready: bool,
    /// Driver-verified average fps over the tick window; falls back to the
    /// agent's self-reported value when the verified loop could not run.
    pub avg_fps: f64,
    /// Verified animation ticks counted over the observation window.
    pub ticks: u32,
    pub first_paint_ms: Option<f64>,
    /// Driver-observed console/page errors plus agent-reported errors.
    pub error_count: u32,
    /// Visually static across the sampling window, or not actually ticking.
    pub no_motion: bool,
    /// No visible change after the simulated key press. `None` when the entry
    /// declares no movement control, so responsiveness was never tested.
    pub no_response: Option<bool>,
    /// Readiness timeout that applied to this probe, for note rendering.
    pub readiness_timeout_ms: u64,
}

impl ProbeEvidence {
    /// Evidence for an entry that was never probed, with every flag set to
    /// its conservative failing value.
    pub fn unprobed(id: EntryId, readiness_timeout_ms: u64) -> Self {
        Self {
            id,
            ready: false,
            avg_fps: 0.0,
            ticks: 0,
            first_paint_ms: None,
            error_count: 0,
            no_motion: true,
            no_response: Some(true),
            readiness_timeout_ms,
        }
    }
}
