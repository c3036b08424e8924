use std::path::Path;

use log::debug;
use thiserror::Error;

#[cfg(windows)]
const PRINT_COMMAND: &str = "powershell";
#[cfg(not(windows))]
const PRINT_COMMAND: &str = "lp";

#[derive(Debug, Error)]
pub enum PrintError {
    #[error("document not found: {path}")]
    DocumentNotFound { path: String },
    #[error("failed to start print command `{command}`: {source}")]
    Spawn {
        command: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("print command `{command}` failed: {details}")]
    Spooler {
        command: &'static str,
        details: String,
    },
}

/// Send a document to the default printer with no visible dialog.
///
/// Windows prints through PowerShell's `Start-Process -Verb Print` with a
/// hidden window; macOS and Linux hand the file to `lp`. The call returns
/// once the job is accepted by the spooler, not when paper comes out.
///
/// # Errors
/// Returns an error when the document does not exist, the platform print
/// command cannot be started, or the spooler rejects the job (for example
/// when no default printer is configured).
pub async fn silent_print(path: &Path) -> Result<(), PrintError> {
    if !path.is_file() {
        return Err(PrintError::DocumentNotFound {
            path: path.display().to_string(),
        });
    }

    let output = print_command(path)
        .output()
        .await
        .map_err(|source| PrintError::Spawn {
            command: PRINT_COMMAND,
            source,
        })?;

    if output.status.success() {
        debug!("print job accepted for {}", path.display());
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let details = if stderr.trim().is_empty() {
        output.status.to_string()
    } else {
        stderr.trim().to_string()
    };
    Err(PrintError::Spooler {
        command: PRINT_COMMAND,
        details,
    })
}

#[cfg(windows)]
fn print_command(path: &Path) -> tokio::process::Command {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    let mut cmd = tokio::process::Command::new(PRINT_COMMAND);
    cmd.arg("-NoProfile")
        .arg("-Command")
        .arg("Start-Process")
        .arg(path)
        .arg("-Verb")
        .arg("Print")
        .arg("-WindowStyle")
        .arg("Hidden")
        .creation_flags(CREATE_NO_WINDOW);
    cmd
}

#[cfg(not(windows))]
fn print_command(path: &Path) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(PRINT_COMMAND);
    cmd.arg(path);
    cmd
}
