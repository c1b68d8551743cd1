// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset, Utc};
use tracing::debug;

use crate::episode::EpisodeCandidate;
use crate::error::FeedError;

use super::locator::{AudioLocator, find_audio_locator, find_entry_audio_locator};

// Episode ids hash the podcast title after this fallback is applied, not a
// bare "Unknown". This is deliberate, and renaming it re-identifies every
// episode of an untitled feed.
const UNKNOWN_PODCAST: &str = "Unknown Podcast";
const UNTITLED_EPISODE: &str = "Untitled";

/// Represents a parsed podcast feed
#[derive(Debug, Clone)]
pub struct Podcast {
    pub title: String,
    pub entries: Vec<FeedEntry>,
}

/// One feed item, before recency filtering
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    pub link: Option<String>,
    pub description: Option<String>,
    /// Publish date exactly as written in the feed
    pub published_raw: Option<String>,
    pub published: Option<DateTime<FixedOffset>>,
    pub audio: Option<AudioLocator>,
}

/// Parse feed XML bytes into a Podcast struct
///
/// RSS 2.0 is read with `rss`. Anything else (Atom, RSS 1.0) goes through
/// `feed-rs`; when that fails too, the RSS error is returned.
pub fn parse_feed(xml_bytes: &[u8]) -> Result<Podcast, FeedError> {
    let rss_error = match rss::Channel::read_from(xml_bytes) {
        Ok(channel) => return Ok(podcast_from_channel(&channel)),
        Err(e) => e,
    };

    match feed_rs::parser::parse(xml_bytes) {
        Ok(feed) => {
            debug!(feed_type = ?feed.feed_type, "Parsed feed that is not RSS 2.0");
            Ok(podcast_from_feed(&feed))
        }
        Err(_) => Err(FeedError::ParseFailed(rss_error)),
    }
}

fn podcast_title(title: Option<&str>) -> String {
    title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNKNOWN_PODCAST)
        .to_string()
}

fn podcast_from_channel(channel: &rss::Channel) -> Podcast {
    Podcast {
        title: podcast_title(Some(channel.title())),
        entries: channel.items().iter().map(parse_entry).collect(),
    }
}

fn podcast_from_feed(feed: &feed_rs::model::Feed) -> Podcast {
    Podcast {
        title: podcast_title(feed.title.as_ref().map(|t| t.content.as_str())),
        entries: feed.entries.iter().map(parse_syndication_entry).collect(),
    }
}

fn parse_syndication_entry(entry: &feed_rs::model::Entry) -> FeedEntry {
    let published = entry.published.map(|date| date.fixed_offset());

    FeedEntry {
        title: entry
            .title
            .as_ref()
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED_EPISODE.to_string()),
        link: entry
            .links
            .iter()
            .find(|link| link.rel.as_deref().is_none_or(|rel| rel == "alternate"))
            .map(|link| link.href.clone()),
        description: entry
            .summary
            .as_ref()
            .map(|s| s.content.clone())
            .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone())),
        // feed-rs only keeps the parsed date; its RFC 3339 form is the raw value
        published_raw: published.map(|date| date.to_rfc3339()),
        published,
        audio: find_entry_audio_locator(entry),
    }
}

fn parse_entry(item: &rss::Item) -> FeedEntry {
    let published_raw = item.pub_date().map(String::from).or_else(|| {
        item.dublin_core_ext()
            .and_then(|dc| dc.dates().first().cloned())
    });

    let published = published_raw.as_deref().and_then(parse_date);

    FeedEntry {
        title: item
            .title()
            .map(String::from)
            .unwrap_or_else(|| UNTITLED_EPISODE.to_string()),
        link: item.link().map(String::from),
        description: item.description().map(String::from),
        published_raw,
        published,
        audio: find_audio_locator(item),
    }
}

/// Parse a feed date, trying RFC 2822 first and then common deviations
fn parse_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let date_str = date_str.trim();
    DateTime::parse_from_rfc2822(date_str)
        .or_else(|_| DateTime::parse_from_rfc3339(date_str))
        .ok()
        .or_else(|| parse_relaxed_date(date_str))
}

/// Try to parse dates that don't strictly conform to RFC 2822
fn parse_relaxed_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    formats
        .iter()
        .find_map(|format| DateTime::parse_from_str(date_str, format).ok())
}

/// Select the entries published at or after `cutoff` that carry an audio resource
///
/// Entries without a parseable date are dropped since their recency cannot be
/// shown. Feed order is preserved.
pub fn recent_episodes(
    podcast: &Podcast,
    source_feed: &str,
    cutoff: DateTime<Utc>,
) -> Vec<EpisodeCandidate> {
    podcast
        .entries
        .iter()
        .filter_map(|entry| {
            let published = entry.published?;
            if published.with_timezone(&Utc) < cutoff {
                return None;
            }
            let audio = entry.audio.clone()?;

            let mut episode = EpisodeCandidate::new(
                podcast.title.clone(),
                entry.title.clone(),
                entry.published_raw.clone().unwrap_or_default(),
                published,
                audio.url,
                source_feed,
            );
            episode.audio_mime_type = audio.mime_type;
            episode.episode_page_url = entry.link.clone().unwrap_or_default();
            episode.description = entry.description.clone().unwrap_or_default();
            Some(episode)
        })
        .collect()
}
