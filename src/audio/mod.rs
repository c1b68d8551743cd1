mod compress;
mod ffmpeg;

pub use compress::{CompressionSettings, compress_candidate, compressed_path_for, needs_compression};
pub use ffmpeg::{FfmpegTranscoder, TranscodeSettings, Transcoder};

#[cfg(test)]
pub(crate) use compress::tests::FakeTranscoder;
