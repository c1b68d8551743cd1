// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::episode::ProcessingState;

/// Errors that can occur when fetching or parsing RSS feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Timed out after {timeout:?} fetching feed from {url}")]
    TimedOut { url: String, timeout: Duration },

    #[error("Failed to read feed file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse RSS feed: {0}")]
    ParseFailed(#[from] rss::Error),

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Errors that can occur during episode downloads
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors that can occur while transcoding a downloaded episode
#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Failed to start {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {path}: {stderr}")]
    DecodeFailed { path: PathBuf, stderr: String },

    #[error("Failed to encode {path}: {stderr}")]
    EncodeFailed { path: PathBuf, stderr: String },

    #[error("Compressed file {path} is {size_mb:.2} MB, still above the {ceiling_mb} MB ceiling")]
    AboveCeiling {
        path: PathBuf,
        size_mb: f64,
        ceiling_mb: f64,
    },

    #[error("Failed to finalize compressed file {path}: {source}")]
    FinalizeFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur when persisting a batch manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to write manifest {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read manifest {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest JSON in {path}: {source}")]
    JsonParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize manifest: {0}")]
    JsonSerializeFailed(#[from] serde_json::Error),
}

/// An episode was asked to move to a state its current state cannot reach
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Episode {episode_id} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub episode_id: String,
    pub from: ProcessingState,
    pub to: ProcessingState,
}

/// Top-level errors for harvest operations
///
/// Per-feed and per-episode failures never surface here; they are recorded on
/// the episode and in the batch manifest instead.
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Invalid harvest option: {0}")]
    InvalidOption(String),

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
