//! The persisted games manifest.
//!
//! The manifest is external state: other tools own most of its fields. The
//! scanner reads entries and writes back `status` only, preserving every
//! field it does not interpret, both per entry and at the top level.

use std::fs;
use std::path::{Path, PathBuf};

use arcadescan_core_types::{EntryId, GameEntry, Status};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::errors::{ScanError, ScanResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub games: Vec<GameEntry>,
    /// Top-level fields other tools put next to `games`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    pub fn load(path: &Path) -> ScanResult<Self> {
        let content = fs::read_to_string(path).map_err(|err| ScanError::ManifestLoad {
            path: path.to_path_buf(),
            detail: err.to_string(),
        })?;
        let manifest: Manifest =
            serde_json::from_str(&content).map_err(|err| ScanError::ManifestLoad {
                path: path.to_path_buf(),
                detail: err.to_string(),
            })?;
        info!(target: "manifest", path = %path.display(), entries = manifest.games.len(), "manifest loaded");
        Ok(manifest)
    }

    /// Write the manifest back, via a sibling temp file and rename so a
    /// crash mid-write cannot truncate the original.
    pub fn save(&self, path: &Path) -> ScanResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|err| ScanError::ManifestWrite {
            path: path.to_path_buf(),
            detail: err.to_string(),
        })?;

        let tmp = sibling_tmp_path(path);
        let write_err = |err: std::io::Error| ScanError::ManifestWrite {
            path: path.to_path_buf(),
            detail: err.to_string(),
        };
        fs::write(&tmp, json.as_bytes()).map_err(write_err)?;
        fs::rename(&tmp, path).map_err(|err| {
            let _ = fs::remove_file(&tmp);
            ScanError::ManifestWrite {
                path: path.to_path_buf(),
                detail: err.to_string(),
            }
        })?;
        Ok(())
    }

    pub fn set_status(&mut self, id: &EntryId, status: Status) -> bool {
        match self.games.iter_mut().find(|entry| &entry.id == id) {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => false,
        }
    }
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "manifest.json".to_string());
    name.push_str(".tmp");
    path.with_file_name(name)
}
