//! Write-back of fresh demotions to the manifest.
//!
//! Reconciliation is an explicit opt-in step, separate from report
//! generation. Only entries moving from a non-broken status to `broken`
//! in this run are written; entries already `broken` are left untouched
//! so repeated scans do not rewrite the manifest.

use std::path::Path;

use arcadescan_classifier::HealthResult;
use tracing::info;

use crate::errors::ScanResult;
use crate::manifest::Manifest;

/// Apply demotions and persist. Returns the number of entries written.
/// A write failure is terminal: the report may already disagree with
/// persisted state.
pub fn apply_demotions(
    manifest: &mut Manifest,
    results: &[HealthResult],
    path: &Path,
) -> ScanResult<usize> {
    let mut updated = 0;
    for result in results {
        if result.wants_write_back() && manifest.set_status(&result.id, result.status) {
            info!(target: "reconcile", id = %result.id, previous = %result.previous_status, "marking entry broken");
            updated += 1;
        }
    }

    if updated > 0 {
        manifest.save(path)?;
        info!(target: "reconcile", updated, path = %path.display(), "manifest updated");
    }
    Ok(updated)
}
