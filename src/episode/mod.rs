mod candidate;
mod download;
mod filename;
mod identity;

pub use candidate::{EpisodeCandidate, ProcessingState, bytes_to_mb};
pub use download::{PARTIAL_SUFFIX, download_audio, download_candidate, partial_path};
pub use filename::{generate_filename, generate_filename_stem, get_audio_extension};
pub use identity::episode_id;

#[cfg(test)]
pub(crate) use candidate::tests::make_candidate;
