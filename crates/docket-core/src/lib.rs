//! Core self-update subsystem for Docket.
//!
//! This crate provides the backend logic the desktop shell drives, and
//! nothing UI-shaped:
//! - Version parsing and ordering.
//! - Release manifest fetching and the update decision.
//! - Artifact download with atomic staging, verification, and
//!   cancellation.
//! - Installer process handoff.
//!
//! The shell is expected to sequence these operations (check → download →
//! install) and render their results; each call here is a synchronous
//! request from the caller's point of view and holds no state across
//! invocations.

mod check;
mod download;
mod install;
mod release;
mod version;

/// Update decision model and check orchestration.
pub use check::{CheckError, UpdateDecision, check_for_update};
/// Artifact download with staging, verification, and cancellation.
pub use download::{DownloadError, DownloadProgress, StagedArtifact, download_artifact};
/// Installer process handoff.
pub use install::{InstallError, InstallHandle, launch_installer};
/// Release manifest model and fetch helper.
pub use release::{FetchError, ReleaseDescriptor, fetch_latest};
/// Version model and parse errors.
pub use version::{AppVersion, VersionComponent, VersionParseError};

/// Build the HTTP client shared across update operations.
///
/// Applies a connect timeout and a versioned User-Agent but no overall
/// request timeout: the metadata fetch bounds itself per request, and
/// downloads must be able to run long.
///
/// # Errors
/// Returns an error when the client (for example its TLS backend) fails to
/// initialize.
pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(10))
        .user_agent(concat!("docket/", env!("CARGO_PKG_VERSION")))
        .build()
}
