//! Scan-level error taxonomy and exit codes.

use std::path::PathBuf;

use thiserror::Error;

/// Exit code for a clean run.
pub const EXIT_CLEAN: u8 = 0;
/// Exit code when the scan completed but flagged at least one entry.
pub const EXIT_FLAGGED: u8 = 1;
/// Exit code for aborted runs: unreachable endpoint, manifest problems,
/// failed write-back.
pub const EXIT_ABORTED: u8 = 2;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The serving endpoint never answered; no entry can be judged, so
    /// the whole run aborts without per-entry results.
    #[error("serving endpoint unreachable at {url}: {detail}")]
    InfraUnreachable { url: String, detail: String },

    #[error("failed to load manifest {path}: {detail}")]
    ManifestLoad { path: PathBuf, detail: String },

    /// The report may now disagree with persisted state, so this is
    /// terminal for the run.
    #[error("failed to write manifest {path}: {detail}")]
    ManifestWrite { path: PathBuf, detail: String },

    #[error("invalid serving endpoint url: {0}")]
    BadEndpoint(String),

    #[error(transparent)]
    Probe(#[from] arcadescan_probe::ProbeError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ScanResult<T> = Result<T, ScanError>;
