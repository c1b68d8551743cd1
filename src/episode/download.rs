// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};
use url::Url;

use crate::error::{DownloadError, TransitionError};
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};

use super::EpisodeCandidate;
use super::candidate::bytes_to_mb;
use super::filename::generate_filename;

/// Suffix for files that are still being written
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Path of the in-progress file for `path`
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Download an audio resource to the specified output path
///
/// Streams the response body into a `.partial` file, reporting progress
/// through the reporter, and renames it into place once the stream ends. The
/// partial file is removed on failure. Returns the number of bytes written.
pub async fn download_audio<C: HttpClient>(
    client: &C,
    url: &Url,
    output_path: &Path,
    episode_id: &str,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    let partial = partial_path(output_path);

    let result = stream_to_file(client, url, &partial, episode_id, reporter).await;
    let bytes_downloaded = match result {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
    };

    if let Err(e) = tokio::fs::rename(&partial, output_path).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(DownloadError::FileWriteFailed {
            path: output_path.to_path_buf(),
            source: e,
        });
    }

    Ok(bytes_downloaded)
}

async fn stream_to_file<C: HttpClient>(
    client: &C,
    url: &Url,
    path: &Path,
    episode_id: &str,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    let url_str = url.as_str();

    let response = client
        .get_stream(url_str)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url_str.to_string(),
            source: e,
        })?;

    if response.status >= 400 {
        return Err(DownloadError::HttpStatus {
            url: url_str.to_string(),
            status: response.status,
        });
    }

    reporter.report(ProgressEvent::DownloadStarting {
        episode_id: episode_id.to_string(),
        content_length: response.content_length,
    });

    let mut file = File::create(path)
        .await
        .map_err(|e| DownloadError::FileCreateFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url_str.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        bytes_downloaded += chunk.len() as u64;

        reporter.report(ProgressEvent::DownloadProgress {
            episode_id: episode_id.to_string(),
            bytes_downloaded,
            total_bytes: response.content_length,
        });
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(bytes_downloaded)
}

/// Download one pending episode into `batch_dir` and record the outcome on it
///
/// Network and filesystem failures are recorded as `download_failed` with an
/// error message and are not returned; the caller moves on to the next
/// episode. Only an episode that is not pending produces an error.
pub async fn download_candidate<C: HttpClient>(
    client: &C,
    episode: &mut EpisodeCandidate,
    batch_dir: &Path,
    reporter: &SharedProgressReporter,
) -> Result<(), TransitionError> {
    episode.start_download()?;

    let filename = generate_filename(episode);
    let output_path = batch_dir.join(&filename);
    debug!(episode_id = %episode.id, file = %filename, "Downloading episode");

    let outcome = match download_audio(
        client,
        &episode.audio_url,
        &output_path,
        &episode.id,
        reporter,
    )
    .await
    {
        Ok(_) => tokio::fs::metadata(&output_path)
            .await
            .map(|meta| meta.len())
            .map_err(|e| DownloadError::FileWriteFailed {
                path: output_path.clone(),
                source: e,
            }),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(bytes) => {
            let size_mb = bytes_to_mb(bytes);
            debug!(episode_id = %episode.id, size_mb, "Downloaded episode");
            reporter.report(ProgressEvent::DownloadCompleted {
                episode_id: episode.id.clone(),
                episode_title: episode.episode_title.clone(),
                bytes_downloaded: bytes,
            });
            episode.finish_download(output_path, size_mb)
        }
        Err(e) => {
            error!(episode_id = %episode.id, error = %e, "Download failed");
            reporter.report(ProgressEvent::DownloadFailed {
                episode_id: episode.id.clone(),
                episode_title: episode.episode_title.clone(),
                error: e.to_string(),
            });
            episode.fail_download(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::{ProcessingState, make_candidate};
    use crate::http::{ByteStream, HttpResponse};
    use crate::progress::NoopReporter;
    use async_trait::async_trait;
    use bytes::Bytes;
    use tempfile::tempdir;

    struct MockHttpClient {
        response_data: Vec<u8>,
        status: u16,
        fail_mid_stream: bool,
    }

    impl MockHttpClient {
        fn ok(data: &[u8]) -> Self {
            Self {
                response_data: data.to_vec(),
                status: 200,
                fail_mid_stream: false,
            }
        }
    }

    /// A reqwest error that needs no network: building a request for an invalid URL
    fn builder_error() -> reqwest::Error {
        reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err()
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            Ok(Bytes::from(self.response_data.clone()))
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            let data = self.response_data.clone();
            let len = data.len() as u64;

            let stream: ByteStream = if self.fail_mid_stream {
                Box::pin(futures::stream::iter(vec![
                    Ok(Bytes::from(data)),
                    Err(builder_error()),
                ]))
            } else {
                Box::pin(futures::stream::once(async move { Ok(Bytes::from(data)) }))
            };

            Ok(HttpResponse {
                status: self.status,
                content_length: Some(len),
                body: stream,
            })
        }
    }

    #[tokio::test]
    async fn download_writes_file() {
        let dir = tempdir().unwrap();
        let output_path = dir.path().join("episode.mp3");
        let client = MockHttpClient::ok(b"test audio content");
        let url = Url::parse("https://example.com/episode.mp3").unwrap();

        let bytes = download_audio(&client, &url, &output_path, "abc", &NoopReporter::shared())
            .await
            .unwrap();

        assert_eq!(bytes, 18);
        assert_eq!(std::fs::read(&output_path).unwrap(), b"test audio content");
        assert!(!partial_path(&output_path).exists());
    }

    #[tokio::test]
    async fn download_fails_on_http_error() {
        let dir = tempdir().unwrap();
        let output_path = dir.path().join("episode.mp3");
        let client = MockHttpClient {
            status: 404,
            ..MockHttpClient::ok(b"Not Found")
        };
        let url = Url::parse("https://example.com/episode.mp3").unwrap();

        let result =
            download_audio(&client, &url, &output_path, "abc", &NoopReporter::shared()).await;

        match result.unwrap_err() {
            DownloadError::HttpStatus { status, .. } => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got {other:?}"),
        }
        assert!(!output_path.exists());
    }

    #[tokio::test]
    async fn stream_failure_removes_partial_file() {
        let dir = tempdir().unwrap();
        let output_path = dir.path().join("episode.mp3");
        let client = MockHttpClient {
            fail_mid_stream: true,
            ..MockHttpClient::ok(b"half")
        };
        let url = Url::parse("https://example.com/episode.mp3").unwrap();

        let result =
            download_audio(&client, &url, &output_path, "abc", &NoopReporter::shared()).await;

        assert!(matches!(result, Err(DownloadError::StreamFailed { .. })));
        assert!(!output_path.exists());
        assert!(!partial_path(&output_path).exists());
    }

    #[tokio::test]
    async fn candidate_download_records_path_and_measured_size() {
        let dir = tempdir().unwrap();
        let data = vec![7u8; 2048];
        let client = MockHttpClient {
            response_data: data,
            status: 200,
            fail_mid_stream: false,
        };
        let mut episode = make_candidate("Episode 1");

        download_candidate(&client, &mut episode, dir.path(), &NoopReporter::shared())
            .await
            .unwrap();

        assert_eq!(episode.state(), ProcessingState::Downloaded);
        let local = episode.local_path().unwrap();
        assert!(local.starts_with(dir.path()));
        assert!(local.exists());
        assert_eq!(episode.size_mb(), Some(2048.0 / (1024.0 * 1024.0)));
    }

    #[tokio::test]
    async fn candidate_download_failure_is_recorded_not_raised() {
        let dir = tempdir().unwrap();
        let client = MockHttpClient {
            status: 500,
            ..MockHttpClient::ok(b"oops")
        };
        let mut episode = make_candidate("Episode 1");

        let result =
            download_candidate(&client, &mut episode, dir.path(), &NoopReporter::shared()).await;

        assert!(result.is_ok());
        assert_eq!(episode.state(), ProcessingState::DownloadFailed);
        assert!(episode.error_message().unwrap().contains("500"));
        assert!(episode.local_path().is_none());
    }

    #[tokio::test]
    async fn candidate_download_rejects_non_pending_episode() {
        let dir = tempdir().unwrap();
        let client = MockHttpClient::ok(b"audio");
        let mut episode = make_candidate("Episode 1");
        download_candidate(&client, &mut episode, dir.path(), &NoopReporter::shared())
            .await
            .unwrap();

        let again =
            download_candidate(&client, &mut episode, dir.path(), &NoopReporter::shared()).await;
        assert!(again.is_err());
        assert_eq!(episode.state(), ProcessingState::Downloaded);
    }
}
