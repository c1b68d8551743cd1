// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::info;

use crate::audio::{CompressionSettings, TranscodeSettings, Transcoder};
use crate::batch::{plan_batches, run_batch};
use crate::episode::EpisodeCandidate;
use crate::error::{HarvestError, ManifestError};
use crate::feed::{ScanLimits, scan_feeds};
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Name of the hand-off file listing every usable episode of a run
pub const HARVEST_LIST_FILENAME: &str = "harvested.json";

/// Options for scanning and harvesting
///
/// Set once when the harvester is built and read-only afterwards.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Root under which `batch_NNN` directories are created
    pub download_dir: PathBuf,
    /// Maximum number of feeds fetched at the same time
    pub scan_concurrency: usize,
    /// Episodes grouped per batch directory
    pub batch_size: usize,
    /// Bitrate of transcoded audio in kbit/s
    pub target_bitrate_kbps: u32,
    /// Sample rate of transcoded audio in Hz
    pub sample_rate_hz: u32,
    /// Downloads above this size in MB are transcoded
    pub size_ceiling_mb: f64,
    /// Upper bound for fetching a single feed
    pub feed_timeout: Duration,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            scan_concurrency: 5,
            batch_size: 50,
            target_bitrate_kbps: 32,
            sample_rate_hz: 22_050,
            size_ceiling_mb: 20.0,
            feed_timeout: Duration::from_secs(30),
        }
    }
}

impl HarvestOptions {
    /// Reject settings that would make scanning or batching impossible
    pub fn validate(&self) -> Result<(), HarvestError> {
        let invalid = |msg: &str| Err(HarvestError::InvalidOption(msg.to_string()));

        if self.scan_concurrency == 0 {
            return invalid("scan concurrency must be at least 1");
        }
        if self.batch_size == 0 {
            return invalid("batch size must be at least 1");
        }
        if self.target_bitrate_kbps == 0 {
            return invalid("target bitrate must be positive");
        }
        if self.sample_rate_hz == 0 {
            return invalid("sample rate must be positive");
        }
        if !(self.size_ceiling_mb.is_finite() && self.size_ceiling_mb > 0.0) {
            return invalid("size ceiling must be a positive number of MB");
        }
        if self.feed_timeout.is_zero() {
            return invalid("feed timeout must be non-zero");
        }
        Ok(())
    }

    pub fn compression_settings(&self) -> CompressionSettings {
        CompressionSettings {
            ceiling_mb: self.size_ceiling_mb,
            transcode: TranscodeSettings {
                bitrate_kbps: self.target_bitrate_kbps,
                sample_rate_hz: self.sample_rate_hz,
            },
        }
    }

    pub fn scan_limits(&self) -> ScanLimits {
        ScanLimits {
            concurrency: self.scan_concurrency,
            timeout: self.feed_timeout,
        }
    }
}

/// Entry point for scanning feeds and harvesting their new episodes
///
/// Owns the HTTP client and transcoder it was built with; neither is shared
/// mutable state.
pub struct Harvester<C, T> {
    client: C,
    transcoder: T,
    options: HarvestOptions,
    reporter: SharedProgressReporter,
}

impl<C: HttpClient, T: Transcoder> Harvester<C, T> {
    /// Validate the options and make sure the download root exists
    pub async fn new(
        client: C,
        transcoder: T,
        options: HarvestOptions,
        reporter: SharedProgressReporter,
    ) -> Result<Self, HarvestError> {
        options.validate()?;
        tokio::fs::create_dir_all(&options.download_dir)
            .await
            .map_err(|e| HarvestError::CreateDirectoryFailed {
                path: options.download_dir.clone(),
                source: e,
            })?;

        info!(download_dir = %options.download_dir.display(), "Harvester initialized");

        Ok(Self {
            client,
            transcoder,
            options,
            reporter,
        })
    }

    pub fn options(&self) -> &HarvestOptions {
        &self.options
    }

    /// Collect episodes published within the last `days_back` days from all feeds
    ///
    /// Failing feeds are logged and contribute nothing; this never fails.
    pub async fn scan(&self, sources: &[String], days_back: u32) -> Vec<EpisodeCandidate> {
        let cutoff = Utc::now() - TimeDelta::days(i64::from(days_back));
        info!(
            feeds = sources.len(),
            days_back, "Scanning feeds for recent episodes"
        );
        self.scan_since(sources, cutoff).await
    }

    /// Collect episodes published at or after `cutoff` from all feeds
    pub async fn scan_since(
        &self,
        sources: &[String],
        cutoff: DateTime<Utc>,
    ) -> Vec<EpisodeCandidate> {
        scan_feeds(
            &self.client,
            sources,
            cutoff,
            self.options.scan_limits(),
            &self.reporter,
        )
        .await
    }

    /// Download and compress episodes batch by batch
    ///
    /// Returns only the episodes with a usable, size-bounded file at
    /// `compressed_path`. Individual failures are recorded in the batch
    /// manifests; an error is returned only when a batch directory cannot be
    /// created.
    pub async fn harvest(
        &self,
        mut episodes: Vec<EpisodeCandidate>,
    ) -> Result<Vec<EpisodeCandidate>, HarvestError> {
        let total = episodes.len();
        info!(episodes = total, "Processing episodes for download and compression");

        let compression = self.options.compression_settings();
        let batches = plan_batches(
            &mut episodes,
            &self.options.download_dir,
            self.options.batch_size,
        )
        .await?;
        let total_batches = batches.len();

        for batch in batches {
            info!(
                "Processing batch {}/{} ({} episodes)",
                batch.number,
                total_batches,
                batch.episodes.len()
            );
            self.reporter.report(ProgressEvent::BatchStarting {
                batch_number: batch.number,
                total_batches,
                episode_count: batch.episodes.len(),
            });

            run_batch(
                &self.client,
                &self.transcoder,
                batch,
                &compression,
                &self.reporter,
            )
            .await;
        }

        let usable: Vec<EpisodeCandidate> =
            episodes.into_iter().filter(|e| e.is_usable()).collect();

        info!("Successfully processed {}/{} episodes", usable.len(), total);
        self.reporter.report(ProgressEvent::HarvestCompleted {
            total,
            usable: usable.len(),
        });

        Ok(usable)
    }
}

/// Write the harvested episodes as pretty JSON for the story-generation step
pub async fn write_harvest_list(
    episodes: &[EpisodeCandidate],
    path: &Path,
) -> Result<(), ManifestError> {
    let json = serde_json::to_string_pretty(episodes)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| ManifestError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}
