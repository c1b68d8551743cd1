// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::episode::EpisodeCandidate;
use crate::error::ManifestError;

use super::plan::batch_dir_name;

/// Snapshot of one batch after processing, kept as an audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchManifest {
    pub batch_number: usize,
    pub timestamp: String,
    pub total_episodes: usize,
    pub successful_downloads: usize,
    pub successful_compressions: usize,
    pub episodes: Vec<EpisodeCandidate>,
}

impl BatchManifest {
    /// Capture the current state of a batch's episodes
    pub fn snapshot(batch_number: usize, episodes: &[EpisodeCandidate]) -> Self {
        Self {
            batch_number,
            timestamp: Utc::now().to_rfc3339(),
            total_episodes: episodes.len(),
            successful_downloads: episodes
                .iter()
                .filter(|e| e.state().has_downloaded())
                .count(),
            successful_compressions: episodes.iter().filter(|e| e.is_usable()).count(),
            episodes: episodes.to_vec(),
        }
    }
}

/// Manifest location inside a batch directory: `batch_NNN_summary.json`
pub fn manifest_path(batch_dir: &Path, batch_number: usize) -> PathBuf {
    batch_dir.join(format!("{}_summary.json", batch_dir_name(batch_number)))
}

/// Write a manifest as pretty-printed JSON
pub async fn write_manifest(manifest: &BatchManifest, path: &Path) -> Result<(), ManifestError> {
    let json = serde_json::to_string_pretty(manifest)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| ManifestError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Read a manifest back from disk
pub async fn read_manifest(path: &Path) -> Result<BatchManifest, ManifestError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ManifestError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    serde_json::from_str(&content).map_err(|e| ManifestError::JsonParseFailed {
        path: path.to_path_buf(),
        source: e,
    })
}
