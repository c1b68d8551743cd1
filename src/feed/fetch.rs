// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use url::Url;

use crate::episode::EpisodeCandidate;
use crate::error::FeedError;
use crate::http::HttpClient;

use super::parse::{parse_feed, recent_episodes};

/// Fetch raw feed bytes from a URL (without parsing)
pub async fn fetch_feed_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes, FeedError> {
    Url::parse(url)?;
    let bytes = client
        .get_bytes(url)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;
    Ok(bytes)
}

/// Read raw feed bytes from a local file (without parsing)
pub async fn read_feed_file(path: &Path) -> Result<Bytes, FeedError> {
    tokio::fs::read(path)
        .await
        .map(Bytes::from)
        .map_err(|e| FeedError::FileReadFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Load feed bytes from either a URL or a local file path
pub async fn load_feed_source<C: HttpClient>(client: &C, source: &str) -> Result<Bytes, FeedError> {
    if is_url(source) {
        fetch_feed_bytes(client, source).await
    } else {
        read_feed_file(Path::new(source)).await
    }
}

/// Fetch one feed and return its episodes published at or after `cutoff`
///
/// Every call goes back to the source; nothing is cached between scans.
pub async fn fetch_recent_episodes<C: HttpClient>(
    client: &C,
    source: &str,
    cutoff: DateTime<Utc>,
) -> Result<Vec<EpisodeCandidate>, FeedError> {
    let bytes = load_feed_source(client, source).await?;
    let podcast = parse_feed(&bytes)?;
    Ok(recent_episodes(&podcast, source, cutoff))
}

/// Determine if a string is a URL or a file path
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Parse a feed list: one source per line, blank lines and `#` comments ignored
pub fn parse_feed_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}
