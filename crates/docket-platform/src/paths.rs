use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AppPathsError {
    #[error("Could not determine home directory")]
    HomeDirUnavailable,
    #[error("Could not determine cache directory")]
    CacheDirUnavailable,
    #[error("Could not determine data directory")]
    DataDirUnavailable,
}

/// Where Docket keeps its transient and durable files on each platform.
///
/// The update core takes destination paths as parameters; these defaults
/// exist for the shell's convenience only.
pub struct AppPaths {
    pub cache_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Build application paths for the current platform.
    ///
    /// # Errors
    /// Returns an error when a required base directory cannot be
    /// determined.
    pub fn new() -> Result<Self, AppPathsError> {
        #[cfg(target_os = "macos")]
        {
            let home = dirs::home_dir().ok_or(AppPathsError::HomeDirUnavailable)?;
            Ok(Self {
                cache_dir: home.join("Library/Caches/docket"),
                data_dir: home.join("Library/Application Support/docket"),
            })
        }

        #[cfg(not(target_os = "macos"))]
        {
            Ok(Self {
                cache_dir: dirs::cache_dir()
                    .ok_or(AppPathsError::CacheDirUnavailable)?
                    .join("docket"),
                data_dir: dirs::data_dir()
                    .ok_or(AppPathsError::DataDirUnavailable)?
                    .join("docket"),
            })
        }
    }

    /// Default area for staging downloaded update artifacts.
    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.cache_dir.join("updates")
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("docket.log")
    }

    /// Ensure all application directories exist on disk.
    ///
    /// # Errors
    /// Returns an error if any directory cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.cache_dir)?;
        std::fs::create_dir_all(self.staging_dir())?;
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}
