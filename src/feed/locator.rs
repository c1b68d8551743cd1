// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use rss::extension::{Extension, ExtensionMap};
use url::Url;

/// The playable audio resource referenced by a feed entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioLocator {
    pub url: Url,
    pub mime_type: Option<String>,
}

/// Find the audio resource of a feed item
///
/// Entries come in three shapes; they are searched in order and the first one
/// yielding a usable URL wins:
///
/// 1. `<enclosure>` with an audio type
/// 2. `<atom:link>` whose type starts with `audio`
/// 3. `<media:content>` with an audio type, directly or inside `<media:group>`
pub fn find_audio_locator(item: &rss::Item) -> Option<AudioLocator> {
    from_enclosure(item)
        .or_else(|| from_atom_links(item.extensions()))
        .or_else(|| from_media_content(item.extensions()))
}

/// Find the audio resource of an entry from a non-RSS 2.0 feed (Atom, RSS 1.0)
///
/// Atom has no enclosure element; `<link>` entries with an audio type take its
/// place ahead of `<media:content>`.
pub fn find_entry_audio_locator(entry: &feed_rs::model::Entry) -> Option<AudioLocator> {
    entry
        .links
        .iter()
        .find_map(|link| {
            let mime = link.media_type.as_deref()?;
            if !mime.starts_with("audio") {
                return None;
            }
            locator(&link.href, Some(mime))
        })
        .or_else(|| {
            entry
                .media
                .iter()
                .flat_map(|media| media.content.iter())
                .find_map(|content| {
                    let mime = content.content_type.as_ref()?.to_string();
                    if !mime.contains("audio") {
                        return None;
                    }
                    locator(content.url.as_ref()?.as_str(), Some(&mime))
                })
        })
}

fn from_enclosure(item: &rss::Item) -> Option<AudioLocator> {
    let enclosure = item.enclosure()?;
    if !enclosure.mime_type().to_lowercase().contains("audio") {
        return None;
    }
    locator(enclosure.url(), Some(enclosure.mime_type()))
}

fn from_atom_links(extensions: &ExtensionMap) -> Option<AudioLocator> {
    extensions
        .get("atom")
        .and_then(|elements| elements.get("link"))
        .into_iter()
        .flatten()
        .find_map(|link| {
            let mime = link.attrs().get("type")?;
            if !mime.starts_with("audio") {
                return None;
            }
            locator(link.attrs().get("href")?, Some(mime))
        })
}

fn from_media_content(extensions: &ExtensionMap) -> Option<AudioLocator> {
    let media = extensions.get("media")?;

    let direct = media.get("content").into_iter().flatten();
    let grouped = media
        .get("group")
        .into_iter()
        .flatten()
        .flat_map(|group| group.children().get("content").into_iter().flatten());

    direct.chain(grouped).find_map(audio_media_content)
}

fn audio_media_content(content: &Extension) -> Option<AudioLocator> {
    let mime = content.attrs().get("type")?;
    if !mime.to_lowercase().contains("audio") {
        return None;
    }
    locator(content.attrs().get("url")?, Some(mime))
}

fn locator(raw_url: &str, mime_type: Option<&str>) -> Option<AudioLocator> {
    let raw_url = raw_url.trim();
    if raw_url.is_empty() {
        return None;
    }
    let url = Url::parse(raw_url).ok()?;
    Some(AudioLocator {
        url,
        mime_type: mime_type.map(String::from).filter(|s| !s.is_empty()),
    })
}
