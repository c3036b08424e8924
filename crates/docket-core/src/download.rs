use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use log::{debug, info};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Downloaded update artifact, staged at its final path.
///
/// Filesystem ownership transfers to whoever installs it; the downloader
/// never deletes a successfully staged artifact.
#[derive(Debug, Clone)]
pub struct StagedArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Best-effort progress report sent while the body streams in.
#[derive(Debug, Clone, Copy)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// Declared `Content-Length`, when the server sent one.
    pub total: Option<u64>,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("download failed with HTTP {status}")]
    HttpStatus { status: reqwest::StatusCode },
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("transfer interrupted after {written} bytes: {source}")]
    Interrupted {
        written: u64,
        #[source]
        source: reqwest::Error,
    },
    #[error("transfer ended after {written} of {expected} declared bytes")]
    LengthMismatch { expected: u64, written: u64 },
    #[error("artifact checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("download cancelled")]
    Cancelled,
    #[error("destination has no parent directory: {}", .0.display())]
    InvalidDestination(PathBuf),
}

impl DownloadError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    fn io_with_path(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::io(
            context,
            std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        )
    }
}

/// Stream `url` into a temporary file next to `dest`, then atomically
/// rename it over `dest`.
///
/// The destination is only ever produced whole: bytes go to a staging file
/// under a temporary name in the same directory, and every failure or
/// cancellation path removes that file before the call returns. An
/// existing file at `dest` is replaced by the rename, never truncated in
/// place. When the release manifest supplies `expected_sha256`, the digest
/// is computed while streaming and verified before the rename.
///
/// There is no overall transfer timeout; long downloads are bounded by
/// `cancel` instead, which aborts the transfer between chunks. Progress is
/// reported best-effort on `progress`; a dropped receiver does not fail
/// the download.
///
/// # Errors
/// Returns an error when the request or transfer fails, the body falls
/// short of the declared length, the digest does not match, staging I/O
/// fails, or the transfer is cancelled; see [`DownloadError`].
pub async fn download_artifact(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    expected_sha256: Option<&str>,
    cancel: &CancellationToken,
    progress: &mpsc::Sender<DownloadProgress>,
) -> Result<StagedArtifact, DownloadError> {
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| DownloadError::InvalidDestination(dest.to_path_buf()))?;
    tokio::fs::create_dir_all(parent).await.map_err(|error| {
        DownloadError::io_with_path("failed to create destination directory", parent, error)
    })?;

    // Staging lives in the destination directory so the final rename never
    // crosses a filesystem boundary.
    let staging = tempfile::Builder::new()
        .prefix(".docket-update-")
        .tempfile_in(parent)
        .map_err(|error| {
            DownloadError::io_with_path("failed to create staging file", parent, error)
        })?;
    let (file, staging_path) = staging.into_parts();
    let mut file = tokio::fs::File::from_std(file);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(DownloadError::Request)?;
    if !response.status().is_success() {
        return Err(DownloadError::HttpStatus {
            status: response.status(),
        });
    }

    let total = response.content_length();
    let mut written: u64 = 0;
    let mut hasher = expected_sha256.map(|_| Sha256::new());
    let mut stream = response.bytes_stream();

    loop {
        let chunk = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("download cancelled after {written} bytes");
                return Err(DownloadError::Cancelled);
            }
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk.map_err(|source| DownloadError::Interrupted { written, source })?;

        file.write_all(&chunk)
            .await
            .map_err(|error| DownloadError::io("failed to write artifact data", error))?;
        if let Some(hasher) = hasher.as_mut() {
            hasher.update(&chunk);
        }
        written += chunk.len() as u64;
        let _ = progress
            .send(DownloadProgress {
                downloaded: written,
                total,
            })
            .await;
    }

    file.flush()
        .await
        .map_err(|error| DownloadError::io("failed to flush artifact data", error))?;
    drop(file);

    if let Some(expected) = total
        && expected != written
    {
        return Err(DownloadError::LengthMismatch { expected, written });
    }

    if let (Some(expected), Some(hasher)) = (expected_sha256, hasher) {
        let actual = format!("{:x}", hasher.finalize());
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(DownloadError::ChecksumMismatch {
                expected: expected.to_ascii_lowercase(),
                actual,
            });
        }
        debug!("artifact checksum verified");
    }

    staging_path.persist(dest).map_err(|error| {
        DownloadError::io_with_path("failed to move artifact into place", dest, error.error)
    })?;

    info!("downloaded {written} bytes to {}", dest.display());
    Ok(StagedArtifact {
        path: dest.to_path_buf(),
        size_bytes: written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_with_path_keeps_kind_and_names_path() {
        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error =
            DownloadError::io_with_path("failed to create staging file", Path::new("/srv/out"), source);

        let DownloadError::Io { context, source } = error else {
            panic!("expected Io variant");
        };
        assert_eq!(context, "failed to create staging file");
        assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
        assert!(source.to_string().contains("/srv/out"));
    }

    #[test]
    fn length_mismatch_display_reports_counts() {
        let error = DownloadError::LengthMismatch {
            expected: 10,
            written: 4,
        };
        assert_eq!(
            error.to_string(),
            "transfer ended after 4 of 10 declared bytes"
        );
    }

    #[tokio::test]
    async fn bare_destination_is_rejected_before_any_request() {
        let client = reqwest::Client::new();
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let result = download_artifact(
            &client,
            "http://127.0.0.1:1/never-contacted",
            Path::new("artifact.run"),
            None,
            &cancel,
            &tx,
        )
        .await;

        assert!(matches!(result, Err(DownloadError::InvalidDestination(_))));
    }
}
