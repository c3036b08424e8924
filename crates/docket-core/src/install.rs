use std::path::Path;
use std::process::Command;

use log::info;
use thiserror::Error;

/// Identity of a launched installer process.
///
/// The process is independent of the caller; the handle is informational
/// only and carries no way to wait on or kill the installer.
#[derive(Debug, Clone, Copy)]
pub struct InstallHandle {
    pub pid: u32,
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("installer artifact not found: {path}")]
    NotFound { path: String },
    #[error("failed to launch installer {path}: {source}")]
    Launch {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Launch the staged artifact as an independent installer process.
///
/// Fire-and-forget handoff: returns as soon as the process is spawned,
/// without waiting for it or inspecting its exit status. The caller is
/// expected to terminate afterward so the installer can replace files that
/// are still in use. The artifact is not deleted; cleanup belongs to the
/// installer.
///
/// # Errors
/// Returns [`InstallError::NotFound`] when the artifact is missing (or, on
/// Unix, cannot be made executable) and [`InstallError::Launch`] when the
/// OS refuses to create the process.
pub fn launch_installer(artifact_path: &Path) -> Result<InstallHandle, InstallError> {
    if !artifact_path.is_file() {
        return Err(InstallError::NotFound {
            path: artifact_path.display().to_string(),
        });
    }

    let child = spawn_installer(artifact_path)?;
    let pid = child.id();
    info!("installer launched (pid {pid}) from {}", artifact_path.display());
    Ok(InstallHandle { pid })
}

#[cfg(target_os = "windows")]
fn spawn_installer(path: &Path) -> Result<std::process::Child, InstallError> {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    Command::new(path)
        .arg("/SILENT")
        .creation_flags(CREATE_NO_WINDOW)
        .spawn()
        .map_err(|source| launch_error(path, source))
}

#[cfg(target_os = "macos")]
fn spawn_installer(path: &Path) -> Result<std::process::Child, InstallError> {
    // `open` mounts disk images and detaches the installer on its own.
    Command::new("open")
        .arg(path)
        .spawn()
        .map_err(|source| launch_error(path, source))
}

#[cfg(all(unix, not(target_os = "macos")))]
fn spawn_installer(path: &Path) -> Result<std::process::Child, InstallError> {
    use std::os::unix::fs::PermissionsExt;
    use std::os::unix::process::CommandExt;

    // Downloaded artifacts arrive without the execute bit.
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|_| {
        InstallError::NotFound {
            path: path.display().to_string(),
        }
    })?;

    // Own process group, so the installer outlives the caller's session.
    Command::new(path)
        .process_group(0)
        .spawn()
        .map_err(|source| launch_error(path, source))
}

fn launch_error(path: &Path, source: std::io::Error) -> InstallError {
    InstallError::Launch {
        path: path.display().to_string(),
        source,
    }
}
