// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

/// Events emitted while scanning feeds and harvesting episodes
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Feed scanning is starting
    ScanStarting { feed_count: usize },

    /// One feed was fetched and filtered
    FeedScanned { source: String, episode_count: usize },

    /// One feed could not be fetched or parsed
    FeedFailed { source: String, error: String },

    /// All feeds have been processed
    ScanCompleted {
        feed_count: usize,
        failed_count: usize,
        episode_count: usize,
    },

    /// A batch is about to be processed
    BatchStarting {
        batch_number: usize,
        total_batches: usize,
        episode_count: usize,
    },

    /// A download is starting
    DownloadStarting {
        episode_id: String,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        episode_id: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// A download completed successfully
    DownloadCompleted {
        episode_id: String,
        episode_title: String,
        bytes_downloaded: u64,
    },

    /// A download failed
    DownloadFailed {
        episode_id: String,
        episode_title: String,
        error: String,
    },

    /// An episode above the size ceiling is being transcoded
    CompressionStarting {
        episode_id: String,
        episode_title: String,
        size_mb: f64,
    },

    /// Transcoding finished
    CompressionCompleted {
        episode_id: String,
        original_mb: f64,
        compressed_mb: f64,
    },

    /// Transcoding failed; the original download is kept
    CompressionFailed {
        episode_id: String,
        episode_title: String,
        error: String,
    },

    /// A batch finished and its manifest was written
    BatchCompleted {
        batch_number: usize,
        total: usize,
        downloaded: usize,
        compressed: usize,
    },

    /// Every batch has been processed
    HarvestCompleted { total: usize, usable: usize },
}

/// Trait for reporting progress events during a harvest.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
