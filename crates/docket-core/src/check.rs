use std::cmp::Ordering;

use log::debug;
use thiserror::Error;

use crate::release::{FetchError, ReleaseDescriptor, fetch_latest};
use crate::version::{AppVersion, VersionParseError};

/// Outcome of an update check.
///
/// Either there is nothing to do, or a newer build exists and its
/// descriptor says where to get it. Decisions are produced fresh on every
/// check — remote state can change between calls, so nothing is cached.
#[derive(Debug, Clone)]
pub enum UpdateDecision {
    UpToDate,
    Available(ReleaseDescriptor),
}

impl UpdateDecision {
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("invalid current version: {0}")]
    CurrentVersion(#[from] VersionParseError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Check the manifest endpoint for a build newer than `current_version`.
///
/// Stateless: every call re-fetches the manifest and re-derives the
/// decision.
///
/// # Errors
/// Returns an error when `current_version` does not parse or the manifest
/// fetch fails; see [`CheckError`].
pub async fn check_for_update(
    client: &reqwest::Client,
    manifest_url: &str,
    current_version: &str,
) -> Result<UpdateDecision, CheckError> {
    let current: AppVersion = current_version.parse()?;
    let release = fetch_latest(client, manifest_url).await?;
    Ok(decide(current, release))
}

fn decide(current: AppVersion, release: ReleaseDescriptor) -> UpdateDecision {
    match release.version.cmp(&current) {
        Ordering::Greater => {
            debug!("update available: {current} -> {}", release.version);
            UpdateDecision::Available(release)
        }
        Ordering::Equal => UpdateDecision::UpToDate,
        Ordering::Less => {
            // A manifest behind the running build is not an update; callers
            // cannot act on it, so it collapses to up-to-date.
            debug!(
                "manifest is behind the running version ({} < {current})",
                release.version
            );
            UpdateDecision::UpToDate
        }
    }
}
