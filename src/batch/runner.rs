// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use tracing::{error, info};

use crate::audio::{CompressionSettings, Transcoder, compress_candidate};
use crate::episode::{ProcessingState, download_candidate};
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};

use super::manifest::{BatchManifest, manifest_path, write_manifest};
use super::plan::Batch;

/// Totals for one processed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub batch_number: usize,
    pub total: usize,
    pub downloaded: usize,
    pub compressed: usize,
}

/// Download and compress every episode of a batch, one after another
///
/// A failure of one episode is recorded on that episode and never stops the
/// batch. Once all episodes are done the manifest is written to the batch
/// directory; a manifest that cannot be written is logged and skipped.
pub async fn run_batch<C: HttpClient, T: Transcoder>(
    client: &C,
    transcoder: &T,
    batch: Batch<'_>,
    compression: &CompressionSettings,
    reporter: &SharedProgressReporter,
) -> BatchSummary {
    for episode in batch.episodes.iter_mut() {
        if let Err(e) = download_candidate(client, episode, &batch.dir, reporter).await {
            error!(episode_id = %episode.id, error = %e, "Skipping episode");
            continue;
        }

        if episode.state() != ProcessingState::Downloaded {
            continue;
        }

        if let Err(e) =
            compress_candidate(transcoder, episode, &batch.dir, compression, reporter).await
        {
            error!(episode_id = %episode.id, error = %e, "Skipping compression");
        }
    }

    let manifest = BatchManifest::snapshot(batch.number, batch.episodes);
    let path = manifest_path(&batch.dir, batch.number);
    if let Err(e) = write_manifest(&manifest, &path).await {
        error!(batch = batch.number, error = %e, "Failed to write batch manifest");
    }

    let summary = BatchSummary {
        batch_number: batch.number,
        total: manifest.total_episodes,
        downloaded: manifest.successful_downloads,
        compressed: manifest.successful_compressions,
    };

    info!(
        "Batch {} summary: {}/{} downloaded, {}/{} compressed",
        summary.batch_number, summary.downloaded, summary.total, summary.compressed, summary.total
    );
    reporter.report(ProgressEvent::BatchCompleted {
        batch_number: summary.batch_number,
        total: summary.total,
        downloaded: summary.downloaded,
        compressed: summary.compressed,
    });

    summary
}
