// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::CompressError;

/// Output parameters for a transcode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscodeSettings {
    /// Target audio bitrate in kbit/s
    pub bitrate_kbps: u32,
    /// Output sample rate in Hz
    pub sample_rate_hz: u32,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            bitrate_kbps: 32,
            sample_rate_hz: 22_050,
        }
    }
}

/// Audio transcoding abstraction for testability
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Decode `input` and write a mono, normalized, low-bitrate MP3 to `output`
    ///
    /// `output` may carry any extension; the container is always MP3.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        settings: &TranscodeSettings,
    ) -> Result<(), CompressError>;
}

/// Transcoder that shells out to the `ffmpeg` binary
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl FfmpegTranscoder {
    /// Use `ffmpeg` from `PATH`
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    /// Use a specific ffmpeg executable
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        settings: &TranscodeSettings,
    ) -> Result<(), CompressError> {
        let args = ffmpeg_args(input, output, settings);
        debug!(program = %self.program.display(), ?args, "Running ffmpeg");

        let result = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CompressError::SpawnFailed {
                program: self.program.display().to_string(),
                source: e,
            })?;

        if result.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
        if is_input_error(&stderr, input) {
            Err(CompressError::DecodeFailed {
                path: input.to_path_buf(),
                stderr,
            })
        } else {
            Err(CompressError::EncodeFailed {
                path: output.to_path_buf(),
                stderr,
            })
        }
    }
}

/// Build the ffmpeg command line: mono, resampled, loudness-normalized MP3
fn ffmpeg_args(input: &Path, output: &Path, settings: &TranscodeSettings) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"]
        .iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_os_string());

    let bitrate = format!("{}k", settings.bitrate_kbps);
    let sample_rate = settings.sample_rate_hz.to_string();
    args.extend(
        [
            "-vn",
            "-ac",
            "1",
            "-ar",
            sample_rate.as_str(),
            "-af",
            "loudnorm",
            "-codec:a",
            "libmp3lame",
            "-b:a",
            bitrate.as_str(),
            "-f",
            "mp3",
        ]
        .iter()
        .map(OsString::from),
    );
    args.push(output.as_os_str().to_os_string());
    args
}

/// ffmpeg reports problems with the source file with these messages
///
/// A missing file is only an input problem when the line names `input`; the
/// same message is printed for an output path in a missing directory.
fn is_input_error(stderr: &str, input: &Path) -> bool {
    const INPUT_MARKERS: &[&str] = &[
        "Invalid data found when processing input",
        "Error opening input",
        "could not find codec parameters",
        "does not contain any stream",
        "Error while decoding",
    ];
    if INPUT_MARKERS.iter().any(|marker| stderr.contains(marker)) {
        return true;
    }

    let input = input.to_string_lossy();
    stderr
        .lines()
        .any(|line| line.contains("No such file or directory") && line.contains(&*input))
}
