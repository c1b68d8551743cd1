mod fetch;
mod locator;
mod parse;
mod scan;

pub use fetch::{
    fetch_feed_bytes, fetch_recent_episodes, is_url, load_feed_source, parse_feed_list,
    read_feed_file,
};
pub use locator::{AudioLocator, find_audio_locator, find_entry_audio_locator};
pub use parse::{FeedEntry, Podcast, parse_feed, recent_episodes};
pub use scan::{ScanLimits, scan_feeds};
