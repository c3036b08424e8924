use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::version::{AppVersion, VersionParseError};

/// Fixed bound for the metadata request. Downloads deliberately have no
/// such cap; see [`crate::download_artifact`].
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Metadata describing an available application build, as published by the
/// release manifest endpoint.
#[derive(Debug, Clone)]
pub struct ReleaseDescriptor {
    pub version: AppVersion,
    pub download_url: String,
    /// ISO-8601 date, preserved exactly as published.
    pub release_date: String,
    /// May be empty when the release ships without notes.
    pub changelog: String,
    /// Hex SHA-256 of the artifact, when the manifest publishes one.
    pub sha256: Option<String>,
}

#[derive(Deserialize)]
struct RawRelease {
    #[serde(default)]
    version: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    release_date: String,
    #[serde(default)]
    changelog: String,
    #[serde(default)]
    sha256: Option<String>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch release metadata: {0}")]
    Request(#[source] reqwest::Error),
    #[error("release metadata request failed with HTTP {status}{body_snippet}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body_snippet: String,
    },
    #[error("failed to parse release metadata: {0}")]
    Parse(#[source] reqwest::Error),
    #[error("release metadata is missing required field `{field}`")]
    MissingField { field: &'static str },
    #[error("release metadata carries invalid version {value:?}: {source}")]
    InvalidVersion {
        value: String,
        #[source]
        source: VersionParseError,
    },
}

/// Fetch the latest release descriptor from the manifest endpoint.
///
/// Issues exactly one request; retrying on transient failures is the
/// caller's policy.
///
/// # Errors
/// Returns an error when the request fails or times out, the server
/// responds with a non-success status, or the manifest body is malformed.
pub async fn fetch_latest(
    client: &reqwest::Client,
    manifest_url: &str,
) -> Result<ReleaseDescriptor, FetchError> {
    let response = client
        .get(manifest_url)
        .header("User-Agent", "docket")
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(FetchError::Request)?;

    if !response.status().is_success() {
        let status = response.status();
        let body_snippet = response
            .text()
            .await
            .ok()
            .map(|body| response_snippet(&body, 160))
            .unwrap_or_default();
        return Err(FetchError::HttpStatus {
            status,
            body_snippet,
        });
    }

    let raw: RawRelease = response.json().await.map_err(FetchError::Parse)?;
    descriptor_from_raw(raw)
}

fn descriptor_from_raw(raw: RawRelease) -> Result<ReleaseDescriptor, FetchError> {
    if raw.version.is_empty() {
        return Err(FetchError::MissingField { field: "version" });
    }
    if raw.url.is_empty() {
        return Err(FetchError::MissingField { field: "url" });
    }

    let version = raw
        .version
        .parse()
        .map_err(|source| FetchError::InvalidVersion {
            value: raw.version.clone(),
            source,
        })?;

    Ok(ReleaseDescriptor {
        version,
        download_url: raw.url,
        release_date: raw.release_date,
        changelog: raw.changelog,
        sha256: raw.sha256,
    })
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}
