// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::episode::EpisodeCandidate;
use crate::error::FeedError;
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};

use super::fetch::fetch_recent_episodes;

/// Limits applied while fanning out over feeds
#[derive(Debug, Clone, Copy)]
pub struct ScanLimits {
    /// Maximum number of feeds fetched at the same time
    pub concurrency: usize,
    /// Upper bound for fetching and parsing a single feed
    pub timeout: Duration,
}

/// Fetch every feed with bounded concurrency and merge their recent episodes
///
/// A feed that fails or times out contributes no episodes and is logged; it
/// never affects the other feeds. Episodes of one feed keep their feed order,
/// while feeds are merged in completion order.
pub async fn scan_feeds<C: HttpClient>(
    client: &C,
    sources: &[String],
    cutoff: DateTime<Utc>,
    limits: ScanLimits,
    reporter: &SharedProgressReporter,
) -> Vec<EpisodeCandidate> {
    reporter.report(ProgressEvent::ScanStarting {
        feed_count: sources.len(),
    });

    let mut results = futures::stream::iter(sources)
        .map(|source| async move {
            let result = fetch_with_timeout(client, source, cutoff, limits.timeout).await;
            (source, result)
        })
        .buffer_unordered(limits.concurrency.max(1));

    let mut all_episodes = Vec::new();
    let mut failed_feeds = 0;

    while let Some((source, result)) = results.next().await {
        match result {
            Ok(episodes) => {
                if episodes.is_empty() {
                    debug!(feed = %source, "No recent episodes");
                } else {
                    info!(feed = %source, count = episodes.len(), "Found recent episodes");
                }
                reporter.report(ProgressEvent::FeedScanned {
                    source: source.clone(),
                    episode_count: episodes.len(),
                });
                all_episodes.extend(episodes);
            }
            Err(e) => {
                failed_feeds += 1;
                warn!(feed = %source, error = %e, "Feed scan failed");
                reporter.report(ProgressEvent::FeedFailed {
                    source: source.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        feeds = sources.len(),
        failed_feeds,
        episodes = all_episodes.len(),
        "Feed scan complete"
    );
    reporter.report(ProgressEvent::ScanCompleted {
        feed_count: sources.len(),
        failed_count: failed_feeds,
        episode_count: all_episodes.len(),
    });

    all_episodes
}

async fn fetch_with_timeout<C: HttpClient>(
    client: &C,
    source: &str,
    cutoff: DateTime<Utc>,
    timeout: Duration,
) -> Result<Vec<EpisodeCandidate>, FeedError> {
    tokio::time::timeout(timeout, fetch_recent_episodes(client, source, cutoff))
        .await
        .map_err(|_| FeedError::TimedOut {
            url: source.to_string(),
            timeout,
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use crate::progress::{NoopReporter, ProgressReporter};
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    enum FeedBehavior {
        Serve(String),
        Hang,
        Garbage,
    }

    struct MockFeedClient {
        feeds: HashMap<String, FeedBehavior>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockFeedClient {
        fn new(feeds: Vec<(&str, FeedBehavior)>) -> Self {
            Self {
                feeds: feeds
                    .into_iter()
                    .map(|(url, behavior)| (url.to_string(), behavior))
                    .collect(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl HttpClient for MockFeedClient {
        async fn get_bytes(&self, url: &str) -> Result<Bytes, reqwest::Error> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;

            let result = match self.feeds.get(url) {
                Some(FeedBehavior::Serve(xml)) => Ok(Bytes::from(xml.clone())),
                Some(FeedBehavior::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Bytes::new())
                }
                Some(FeedBehavior::Garbage) | None => Ok(Bytes::from_static(b"<html/>")),
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            unimplemented!("feeds are fetched in one piece")
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        failed: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn report(&self, event: ProgressEvent) {
            if let ProgressEvent::FeedFailed { source, .. } = event {
                self.failed.lock().unwrap().push(source);
            }
        }
    }

    fn feed_xml(podcast: &str, titles: &[&str]) -> String {
        let items: String = titles
            .iter()
            .map(|title| {
                format!(
                    r#"<item><title>{title}</title>
                       <pubDate>Tue, 16 Jan 2024 12:00:00 +0000</pubDate>
                       <enclosure url="https://example.com/{title}.mp3" length="1" type="audio/mpeg"/>
                       </item>"#
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>{podcast}</title><description>d</description>{items}</channel></rss>"#
        )
    }

    fn cutoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
    }

    fn limits(concurrency: usize) -> ScanLimits {
        ScanLimits {
            concurrency,
            timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn timed_out_feed_does_not_affect_others() {
        let client = MockFeedClient::new(vec![
            ("https://a.example/feed", FeedBehavior::Serve(feed_xml("A", &["a1", "a2"]))),
            ("https://b.example/feed", FeedBehavior::Hang),
            ("https://c.example/feed", FeedBehavior::Serve(feed_xml("C", &["c1"]))),
        ]);
        let sources: Vec<String> = vec![
            "https://a.example/feed".into(),
            "https://b.example/feed".into(),
            "https://c.example/feed".into(),
        ];
        let recorder = Arc::new(RecordingReporter::default());
        let reporter: SharedProgressReporter = recorder.clone();

        let episodes = scan_feeds(&client, &sources, cutoff(), limits(5), &reporter).await;

        let mut titles: Vec<_> = episodes.iter().map(|e| e.episode_title.as_str()).collect();
        titles.sort();
        assert_eq!(titles, vec!["a1", "a2", "c1"]);
        assert_eq!(
            *recorder.failed.lock().unwrap(),
            vec!["https://b.example/feed".to_string()]
        );
    }

    #[tokio::test]
    async fn unparseable_feed_yields_no_episodes() {
        let client = MockFeedClient::new(vec![
            ("https://a.example/feed", FeedBehavior::Garbage),
            ("https://b.example/feed", FeedBehavior::Serve(feed_xml("B", &["b1"]))),
        ]);
        let sources: Vec<String> = vec![
            "https://a.example/feed".into(),
            "https://b.example/feed".into(),
        ];

        let episodes =
            scan_feeds(&client, &sources, cutoff(), limits(2), &NoopReporter::shared()).await;

        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].podcast_title, "B");
    }

    #[tokio::test]
    async fn episodes_within_a_feed_keep_feed_order() {
        let client = MockFeedClient::new(vec![(
            "https://a.example/feed",
            FeedBehavior::Serve(feed_xml("A", &["first", "second", "third"])),
        )]);
        let sources: Vec<String> = vec!["https://a.example/feed".into()];

        let episodes =
            scan_feeds(&client, &sources, cutoff(), limits(5), &NoopReporter::shared()).await;

        let titles: Vec<_> = episodes.iter().map(|e| e.episode_title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let sources: Vec<String> = (0..12)
            .map(|i| format!("https://feed{i}.example/rss"))
            .collect();
        let client = MockFeedClient::new(
            sources
                .iter()
                .enumerate()
                .map(|(i, url)| {
                    (
                        url.as_str(),
                        FeedBehavior::Serve(feed_xml(&format!("P{i}"), &["ep"])),
                    )
                })
                .collect(),
        );

        let episodes =
            scan_feeds(&client, &sources, cutoff(), limits(3), &NoopReporter::shared()).await;

        assert_eq!(episodes.len(), 12);
        assert!(client.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn no_feeds_means_no_episodes() {
        let client = MockFeedClient::new(vec![]);
        let episodes = scan_feeds(&client, &[], cutoff(), limits(5), &NoopReporter::shared()).await;
        assert!(episodes.is_empty());
    }
}
