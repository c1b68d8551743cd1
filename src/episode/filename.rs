// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::EpisodeCandidate;

/// Maximum length for each title component of a filename
///
/// Kept short so `<root>/batch_NNN/<id>_<podcast>_<episode>.ext` stays well
/// inside the 260 character path limit of Windows hosts.
const MAX_COMPONENT_LENGTH: usize = 30;

/// Check if a character is allowed in a title component (whitelist approach)
///
/// Underscores are excluded because they separate the filename components.
fn is_valid_filename_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

/// Generate a filename stem (without extension) for an episode
///
/// Format: "<id>_<podcast>_<episode>". The id prefix keeps names unique even
/// when both titles sanitize down to nothing.
pub fn generate_filename_stem(episode: &EpisodeCandidate) -> String {
    format!(
        "{}_{}_{}",
        episode.id,
        sanitize_component(&episode.podcast_title),
        sanitize_component(&episode.episode_title)
    )
}

/// Get the audio file extension for an episode
///
/// Attempts to extract from URL path or MIME type, defaults to "mp3"
pub fn get_audio_extension(episode: &EpisodeCandidate) -> String {
    if let Some(ext) = episode
        .audio_url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|filename| filename.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| is_valid_audio_extension(ext))
    {
        return ext.to_lowercase();
    }

    if let Some(ref mime) = episode.audio_mime_type
        && let Some(ext) = mime_to_extension(mime)
    {
        return ext.to_string();
    }

    "mp3".to_string()
}

/// Generate a complete filename for an episode (with extension)
pub fn generate_filename(episode: &EpisodeCandidate) -> String {
    let stem = generate_filename_stem(episode);
    let ext = get_audio_extension(episode);
    format!("{}.{}", stem, ext)
}

/// Sanitize a title for use as one filename component
fn sanitize_component(title: &str) -> String {
    let sanitized: String = title
        .chars()
        .map(|c| if is_valid_filename_char(c) { c } else { '-' })
        .collect();

    let collapsed = collapse_separators(&sanitized);
    let trimmed = collapsed.trim_matches('-');

    truncate_component(trimmed, MAX_COMPONENT_LENGTH)
}

/// Collapse runs of dashes into a single dash
fn collapse_separators(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut last_was_separator = false;

    for c in s.chars() {
        if c == '-' {
            if !last_was_separator {
                result.push('-');
                last_was_separator = true;
            }
        } else {
            result.push(c);
            last_was_separator = false;
        }
    }

    result
}

/// Truncate to `max_len` characters without leaving a trailing dash
///
/// Input is ASCII after sanitizing, so byte and char lengths agree.
fn truncate_component(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    s[..max_len].trim_end_matches('-').to_string()
}

/// Check if a string is a valid audio file extension
fn is_valid_audio_extension(ext: &str) -> bool {
    matches!(
        ext.to_lowercase().as_str(),
        "mp3" | "m4a" | "mp4" | "aac" | "ogg" | "opus" | "wav" | "flac"
    )
}

/// Map MIME types to file extensions
fn mime_to_extension(mime: &str) -> Option<&'static str> {
    match mime.to_lowercase().as_str() {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some("m4a"),
        "audio/aac" => Some("aac"),
        "audio/ogg" => Some("ogg"),
        "audio/opus" => Some("opus"),
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        _ => None,
    }
}
