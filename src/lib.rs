//! arcadescan: health scanner for embedded browser games.
//!
//! The library surface exists for the binary and the integration tests;
//! the crates under `crates/` hold the reusable pieces (bridge contract,
//! in-document agent, probe driver, classifier).

pub mod cli;
pub mod errors;
pub mod manifest;
pub mod reconcile;
pub mod report;
pub mod runner;

pub use errors::{ScanError, ScanResult, EXIT_ABORTED, EXIT_CLEAN, EXIT_FLAGGED};
