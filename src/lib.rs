pub mod audio;
pub mod batch;
pub mod episode;
pub mod error;
pub mod feed;
pub mod harvest;
pub mod http;
pub mod progress;

// Re-export main types for convenience
pub use audio::{CompressionSettings, FfmpegTranscoder, TranscodeSettings, Transcoder};
pub use batch::{BatchManifest, BatchSummary, plan_batches, run_batch};
pub use episode::{EpisodeCandidate, ProcessingState, episode_id, generate_filename};
pub use error::{
    CompressError, DownloadError, FeedError, HarvestError, ManifestError, TransitionError,
};
pub use feed::{is_url, parse_feed, parse_feed_list, scan_feeds};
pub use harvest::{HARVEST_LIST_FILENAME, HarvestOptions, Harvester, write_harvest_list};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
