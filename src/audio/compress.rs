// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::episode::{EpisodeCandidate, bytes_to_mb, partial_path};
use crate::error::{CompressError, TransitionError};
use crate::progress::{ProgressEvent, SharedProgressReporter};

use super::ffmpeg::{TranscodeSettings, Transcoder};

/// Size ceiling plus the parameters used when it is exceeded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionSettings {
    /// Files larger than this (in MB) are transcoded
    pub ceiling_mb: f64,
    pub transcode: TranscodeSettings,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            ceiling_mb: 20.0,
            transcode: TranscodeSettings::default(),
        }
    }
}

/// A file needs transcoding only when it is strictly above the ceiling
pub fn needs_compression(size_mb: f64, ceiling_mb: f64) -> bool {
    size_mb > ceiling_mb
}

/// Location of the compressed copy of `local_path` inside `batch_dir`
pub fn compressed_path_for(local_path: &Path, batch_dir: &Path) -> PathBuf {
    let stem = local_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "episode".to_string());
    batch_dir.join(format!("compressed_{stem}.mp3"))
}

/// Bring a downloaded episode under the size ceiling and record the outcome
///
/// Episodes at or below the ceiling keep their download as the compressed
/// artifact. Larger ones are transcoded into the batch directory; on success
/// the original is deleted, on failure it is kept and the episode is marked
/// `compression_failed`. A transcode that is still above the ceiling counts
/// as a failure and its output is discarded. Only an episode that is not
/// `downloaded` produces an error.
pub async fn compress_candidate<T: Transcoder>(
    transcoder: &T,
    episode: &mut EpisodeCandidate,
    batch_dir: &Path,
    settings: &CompressionSettings,
    reporter: &SharedProgressReporter,
) -> Result<(), TransitionError> {
    episode.start_compression()?;

    let (Some(local_path), Some(size_mb)) = (
        episode.local_path().map(Path::to_path_buf),
        episode.size_mb(),
    ) else {
        return episode.fail_compression("downloaded episode has no local file");
    };

    if !needs_compression(size_mb, settings.ceiling_mb) {
        debug!(episode_id = %episode.id, size_mb, "Already under size ceiling");
        return episode.skip_compression();
    }

    debug!(episode_id = %episode.id, size_mb, "Compressing episode");
    reporter.report(ProgressEvent::CompressionStarting {
        episode_id: episode.id.clone(),
        episode_title: episode.episode_title.clone(),
        size_mb,
    });

    let output_path = compressed_path_for(&local_path, batch_dir);
    let outcome = match transcode_into(transcoder, &local_path, &output_path, &settings.transcode)
        .await
    {
        Ok(compressed_mb) if needs_compression(compressed_mb, settings.ceiling_mb) => {
            if let Err(e) = tokio::fs::remove_file(&output_path).await {
                warn!(
                    episode_id = %episode.id,
                    path = %output_path.display(),
                    error = %e,
                    "Failed to remove oversized compressed file"
                );
            }
            Err(CompressError::AboveCeiling {
                path: output_path.clone(),
                size_mb: compressed_mb,
                ceiling_mb: settings.ceiling_mb,
            })
        }
        other => other,
    };

    match outcome {
        Ok(compressed_mb) => {
            let reduction = (1.0 - compressed_mb / size_mb) * 100.0;
            debug!(
                episode_id = %episode.id,
                compressed_mb,
                reduction_percent = reduction,
                "Compressed episode"
            );
            reporter.report(ProgressEvent::CompressionCompleted {
                episode_id: episode.id.clone(),
                original_mb: size_mb,
                compressed_mb,
            });
            episode.finish_compression(output_path, compressed_mb)?;

            if let Err(e) = tokio::fs::remove_file(&local_path).await {
                warn!(
                    episode_id = %episode.id,
                    path = %local_path.display(),
                    error = %e,
                    "Failed to remove original after compression"
                );
            }
            Ok(())
        }
        Err(e) => {
            error!(episode_id = %episode.id, error = %e, "Compression failed");
            reporter.report(ProgressEvent::CompressionFailed {
                episode_id: episode.id.clone(),
                episode_title: episode.episode_title.clone(),
                error: e.to_string(),
            });
            episode.fail_compression(e.to_string())
        }
    }
}

/// Transcode through a `.partial` file and return the final size in MB
async fn transcode_into<T: Transcoder>(
    transcoder: &T,
    input: &Path,
    output: &Path,
    settings: &TranscodeSettings,
) -> Result<f64, CompressError> {
    let partial = partial_path(output);

    let result: Result<f64, CompressError> = async {
        transcoder.transcode(input, &partial, settings).await?;
        tokio::fs::rename(&partial, output)
            .await
            .map_err(|e| CompressError::FinalizeFailed {
                path: output.to_path_buf(),
                source: e,
            })?;
        tokio::fs::metadata(output)
            .await
            .map(|meta| bytes_to_mb(meta.len()))
            .map_err(|e| CompressError::FinalizeFailed {
                path: output.to_path_buf(),
                source: e,
            })
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&partial).await;
    }
    result
}
