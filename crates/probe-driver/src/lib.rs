//! Health probe driver for embedded canvas games.
//!
//! For each manifest entry the driver navigates a real browser to the
//! entry's embedding route, waits for the injected agent's readiness
//! signal, captures time-separated luminance snapshots of the rendering
//! surface, optionally dispatches one simulated movement key, and gathers
//! driver-side error counts. The result is a [`ProbeEvidence`] record the
//! classifier turns into a verdict.
//!
//! [`ProbeEvidence`]: arcadescan_core_types::ProbeEvidence

pub mod config;
pub mod js;
pub mod keys;
pub mod probe;
pub mod session;
pub mod signature;
pub mod transport;

pub use config::{ProbeConfig, TransportConfig};
pub use keys::{derive_movement_key, KeyToken};
pub use probe::HealthProbe;
pub use session::{PageEvent, ProbeBrowser, ProbeSession};
pub use signature::{motion_delta, FrameSignature};
pub use transport::{ChromiumTransport, CommandTarget, NoopTransport, ProbeTransport};

use thiserror::Error;

/// Errors surfaced by the probe driver. Per-entry failures are recovered
/// by the probe loop as conservative failing evidence; only transport
/// bring-up errors propagate to the caller.
#[derive(Clone, Debug, Error)]
pub enum ProbeError {
    #[error("navigation timed out")]
    NavTimeout,
    #[error("cdp i/o failure: {0}")]
    CdpIo(String),
    #[error("snapshot capture failed: {0}")]
    Capture(String),
    #[error("input dispatch failed: {0}")]
    Dispatch(String),
    #[error("internal error: {0}")]
    Internal(String),
}
