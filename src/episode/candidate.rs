// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::TransitionError;

use super::identity::episode_id;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Convert a byte count to megabytes (MiB), the unit all size limits use
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Where an episode is in the download/compress pipeline
///
/// The only legal paths are:
///
/// ```text
/// pending -> downloading -> download_failed
/// pending -> downloading -> downloaded -> compressing -> compressed
///                                                     -> compression_not_needed
///                                                     -> compression_failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    Pending,
    Downloading,
    Downloaded,
    DownloadFailed,
    Compressing,
    Compressed,
    CompressionNotNeeded,
    CompressionFailed,
}

impl ProcessingState {
    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(self, next: ProcessingState) -> bool {
        use ProcessingState::*;
        matches!(
            (self, next),
            (Pending, Downloading)
                | (Downloading, Downloaded)
                | (Downloading, DownloadFailed)
                | (Downloaded, Compressing)
                | (Compressing, Compressed)
                | (Compressing, CompressionNotNeeded)
                | (Compressing, CompressionFailed)
        )
    }

    /// True for every state only reachable through a successful download
    pub fn has_downloaded(self) -> bool {
        use ProcessingState::*;
        matches!(
            self,
            Downloaded | Compressing | Compressed | CompressionNotNeeded | CompressionFailed
        )
    }

    /// True when a size-bounded audio artifact exists for downstream use
    pub fn is_usable(self) -> bool {
        matches!(
            self,
            ProcessingState::Compressed | ProcessingState::CompressionNotNeeded
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingState::Pending => "pending",
            ProcessingState::Downloading => "downloading",
            ProcessingState::Downloaded => "downloaded",
            ProcessingState::DownloadFailed => "download_failed",
            ProcessingState::Compressing => "compressing",
            ProcessingState::Compressed => "compressed",
            ProcessingState::CompressionNotNeeded => "compression_not_needed",
            ProcessingState::CompressionFailed => "compression_failed",
        }
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recent episode found in a feed, tracked through download and compression
///
/// Feed metadata is public and immutable by convention. The processing fields
/// are private and only change through the transition methods, each of which
/// checks that the episode is in the expected predecessor state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeCandidate {
    pub id: String,
    pub podcast_title: String,
    pub episode_title: String,
    pub episode_page_url: String,
    pub audio_url: Url,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_mime_type: Option<String>,
    pub published_at_raw: String,
    pub published_at: DateTime<FixedOffset>,
    pub description: String,
    pub source_feed: String,

    processing_state: ProcessingState,
    local_path: Option<PathBuf>,
    compressed_path: Option<PathBuf>,
    size_mb: Option<f64>,
    compressed_size_mb: Option<f64>,
    error_message: Option<String>,
}

impl EpisodeCandidate {
    /// Create a pending candidate; the id is derived from the titles and raw date
    pub fn new(
        podcast_title: impl Into<String>,
        episode_title: impl Into<String>,
        published_at_raw: impl Into<String>,
        published_at: DateTime<FixedOffset>,
        audio_url: Url,
        source_feed: impl Into<String>,
    ) -> Self {
        let podcast_title = podcast_title.into();
        let episode_title = episode_title.into();
        let published_at_raw = published_at_raw.into();

        Self {
            id: episode_id(&podcast_title, &episode_title, &published_at_raw),
            podcast_title,
            episode_title,
            episode_page_url: String::new(),
            audio_url,
            audio_mime_type: None,
            published_at_raw,
            published_at,
            description: String::new(),
            source_feed: source_feed.into(),
            processing_state: ProcessingState::Pending,
            local_path: None,
            compressed_path: None,
            size_mb: None,
            compressed_size_mb: None,
            error_message: None,
        }
    }

    pub fn state(&self) -> ProcessingState {
        self.processing_state
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    pub fn compressed_path(&self) -> Option<&Path> {
        self.compressed_path.as_deref()
    }

    pub fn size_mb(&self) -> Option<f64> {
        self.size_mb
    }

    pub fn compressed_size_mb(&self) -> Option<f64> {
        self.compressed_size_mb
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_usable(&self) -> bool {
        self.processing_state.is_usable()
    }

    pub fn start_download(&mut self) -> Result<(), TransitionError> {
        self.advance(ProcessingState::Downloading)
    }

    pub fn finish_download(&mut self, path: PathBuf, size_mb: f64) -> Result<(), TransitionError> {
        self.advance(ProcessingState::Downloaded)?;
        self.local_path = Some(path);
        self.size_mb = Some(size_mb);
        Ok(())
    }

    pub fn fail_download(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.advance(ProcessingState::DownloadFailed)?;
        self.record_error(message);
        Ok(())
    }

    pub fn start_compression(&mut self) -> Result<(), TransitionError> {
        self.advance(ProcessingState::Compressing)
    }

    pub fn finish_compression(
        &mut self,
        path: PathBuf,
        size_mb: f64,
    ) -> Result<(), TransitionError> {
        self.advance(ProcessingState::Compressed)?;
        self.compressed_path = Some(path);
        self.compressed_size_mb = Some(size_mb);
        Ok(())
    }

    /// The downloaded file is already small enough; it doubles as the compressed artifact
    pub fn skip_compression(&mut self) -> Result<(), TransitionError> {
        self.advance(ProcessingState::CompressionNotNeeded)?;
        self.compressed_path = self.local_path.clone();
        self.compressed_size_mb = self.size_mb;
        Ok(())
    }

    pub fn fail_compression(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.advance(ProcessingState::CompressionFailed)?;
        self.record_error(message);
        Ok(())
    }

    fn advance(&mut self, next: ProcessingState) -> Result<(), TransitionError> {
        if !self.processing_state.can_transition_to(next) {
            return Err(TransitionError {
                episode_id: self.id.clone(),
                from: self.processing_state,
                to: next,
            });
        }
        self.processing_state = next;
        Ok(())
    }

    fn record_error(&mut self, message: impl Into<String>) {
        if self.error_message.is_none() {
            self.error_message = Some(message.into());
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_candidate(title: &str) -> EpisodeCandidate {
        let published = DateTime::parse_from_rfc2822("Mon, 15 Jan 2024 12:00:00 +0000").unwrap();
        EpisodeCandidate::new(
            "Test Podcast",
            title,
            "Mon, 15 Jan 2024 12:00:00 +0000",
            published,
            Url::parse("https://example.com/episode.mp3").unwrap(),
            "https://example.com/feed.xml",
        )
    }

    #[test]
    fn new_candidate_is_pending() {
        let episode = make_candidate("Episode 1");
        assert_eq!(episode.state(), ProcessingState::Pending);
        assert!(episode.local_path().is_none());
        assert!(episode.compressed_path().is_none());
        assert!(episode.error_message().is_none());
        assert!(!episode.is_usable());
    }

    #[test]
    fn successful_download_then_compression() {
        let mut episode = make_candidate("Episode 1");
        episode.start_download().unwrap();
        episode
            .finish_download(PathBuf::from("/tmp/ep.mp3"), 42.0)
            .unwrap();
        episode.start_compression().unwrap();
        episode
            .finish_compression(PathBuf::from("/tmp/compressed_ep.mp3"), 9.5)
            .unwrap();

        assert_eq!(episode.state(), ProcessingState::Compressed);
        assert_eq!(episode.size_mb(), Some(42.0));
        assert_eq!(episode.compressed_size_mb(), Some(9.5));
        assert_eq!(
            episode.compressed_path(),
            Some(Path::new("/tmp/compressed_ep.mp3"))
        );
        assert!(episode.is_usable());
    }

    #[test]
    fn skip_compression_aliases_local_path() {
        let mut episode = make_candidate("Episode 1");
        episode.start_download().unwrap();
        episode
            .finish_download(PathBuf::from("/tmp/ep.mp3"), 3.0)
            .unwrap();
        episode.start_compression().unwrap();
        episode.skip_compression().unwrap();

        assert_eq!(episode.state(), ProcessingState::CompressionNotNeeded);
        assert_eq!(episode.compressed_path(), episode.local_path());
        assert!(episode.is_usable());
    }

    #[test]
    fn compression_requires_successful_download() {
        let mut episode = make_candidate("Episode 1");
        episode.start_download().unwrap();
        episode.fail_download("connection reset").unwrap();

        let err = episode.start_compression().unwrap_err();
        assert_eq!(err.from, ProcessingState::DownloadFailed);
        assert_eq!(err.to, ProcessingState::Compressing);
        assert!(episode.compressed_path().is_none());
        assert_eq!(episode.state(), ProcessingState::DownloadFailed);
    }

    #[test]
    fn pending_cannot_jump_to_downloaded() {
        let mut episode = make_candidate("Episode 1");
        let result = episode.finish_download(PathBuf::from("/tmp/ep.mp3"), 1.0);

        assert!(result.is_err());
        assert_eq!(episode.state(), ProcessingState::Pending);
        assert!(episode.local_path().is_none());
    }

    #[test]
    fn terminal_states_do_not_regress() {
        let mut episode = make_candidate("Episode 1");
        episode.start_download().unwrap();
        episode.fail_download("boom").unwrap();

        assert!(episode.start_download().is_err());
        assert!(
            episode
                .finish_download(PathBuf::from("/tmp/ep.mp3"), 1.0)
                .is_err()
        );
    }

    #[test]
    fn first_error_message_is_kept() {
        let mut episode = make_candidate("Episode 1");
        episode.start_download().unwrap();
        episode.fail_download("first").unwrap();
        let _ = episode.fail_compression("second");

        assert_eq!(episode.error_message(), Some("first"));
    }

    #[test]
    fn downloaded_and_download_failed_are_exclusive() {
        for state in [
            ProcessingState::Downloaded,
            ProcessingState::Compressing,
            ProcessingState::Compressed,
            ProcessingState::CompressionNotNeeded,
            ProcessingState::CompressionFailed,
        ] {
            assert!(state.has_downloaded());
            assert!(!ProcessingState::DownloadFailed.can_transition_to(state));
        }
        assert!(!ProcessingState::DownloadFailed.has_downloaded());
    }

    #[test]
    fn state_serializes_as_snake_case() {
        let json = serde_json::to_string(&ProcessingState::CompressionNotNeeded).unwrap();
        assert_eq!(json, "\"compression_not_needed\"");
        assert_eq!(
            ProcessingState::DownloadFailed.to_string(),
            "download_failed"
        );
    }

    #[test]
    fn candidate_json_includes_processing_fields() {
        let mut episode = make_candidate("Episode 1");
        episode.start_download().unwrap();
        episode.fail_download("404").unwrap();

        let value = serde_json::to_value(&episode).unwrap();
        assert_eq!(value["processing_state"], "download_failed");
        assert_eq!(value["error_message"], "404");
        assert_eq!(value["episode_title"], "Episode 1");
    }
}
