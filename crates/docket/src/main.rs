//! Headless shell for the Docket backend: sequences the update cycle
//! (check → download → install handoff) and silent printing, and renders
//! their results as status lines. A graphical frontend would drive the
//! same `docket-core` operations the same way.

mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use docket_core::{DownloadProgress, UpdateDecision};
use docket_platform::AppPaths;

/// Release manifest queried when no override is given.
const DEFAULT_MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/docketapp/docket/main/releases/latest.json";

#[derive(Parser, Debug)]
#[command(name = "docket", version)]
#[command(about = "Docket backend: silent printing and self-update", long_about = None)]
struct Args {
    /// Release manifest endpoint to query.
    #[arg(long, value_name = "URL", default_value = DEFAULT_MANIFEST_URL)]
    manifest_url: String,

    /// Compare against this version instead of the running build's.
    #[arg(long, value_name = "X.Y.Z")]
    current_version: Option<String>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Check whether a newer build is published.
    Check,
    /// Check, download, and hand off to the installer.
    Update {
        /// Download destination (defaults to the staging directory).
        #[arg(long, value_name = "PATH")]
        dest: Option<PathBuf>,
    },
    /// Print a document silently on the default printer.
    Print {
        /// Document to print.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.debug);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error:#}");
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let client = docket_core::build_http_client().context("failed to build HTTP client")?;
    let current_version = args
        .current_version
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    match args.command {
        CliCommand::Check => {
            let decision =
                docket_core::check_for_update(&client, &args.manifest_url, &current_version)
                    .await?;
            render_decision(&decision, &current_version);
        }
        CliCommand::Update { dest } => {
            run_update(&client, &args.manifest_url, &current_version, dest).await?;
        }
        CliCommand::Print { file } => {
            docket_platform::silent_print(&file).await?;
            println!("sent {} to the default printer", file.display());
        }
    }

    Ok(())
}

fn render_decision(decision: &UpdateDecision, current_version: &str) {
    match decision {
        UpdateDecision::UpToDate => println!("docket {current_version} is up to date"),
        UpdateDecision::Available(release) => {
            if release.release_date.is_empty() {
                println!("update available: {}", release.version);
            } else {
                println!(
                    "update available: {} (released {})",
                    release.version, release.release_date
                );
            }
            if !release.changelog.is_empty() {
                println!("\n{}", release.changelog);
            }
        }
    }
}

async fn run_update(
    client: &reqwest::Client,
    manifest_url: &str,
    current_version: &str,
    dest: Option<PathBuf>,
) -> Result<()> {
    let decision = docket_core::check_for_update(client, manifest_url, current_version).await?;
    let UpdateDecision::Available(release) = decision else {
        println!("docket {current_version} is up to date");
        return Ok(());
    };

    let dest = match dest {
        Some(dest) => dest,
        None => {
            let paths = AppPaths::new().context("failed to resolve application directories")?;
            paths
                .ensure_dirs()
                .context("failed to create application directories")?;
            paths
                .staging_dir()
                .join(artifact_file_name(&release.download_url))
        }
    };

    println!("downloading docket {}...", release.version);

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("cancellation requested");
            ctrl_c_cancel.cancel();
        }
    });

    let (tx, mut rx) = mpsc::channel::<DownloadProgress>(32);
    let reporter = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            match progress.total {
                Some(total) if total > 0 => eprint!("\r{}/{total} bytes", progress.downloaded),
                _ => eprint!("\r{} bytes", progress.downloaded),
            }
        }
        eprintln!();
    });

    let downloaded = docket_core::download_artifact(
        client,
        &release.download_url,
        &dest,
        release.sha256.as_deref(),
        &cancel,
        &tx,
    )
    .await;
    drop(tx);
    let _ = reporter.await;
    let artifact = downloaded?;

    let handle = docket_core::launch_installer(&artifact.path)?;
    println!(
        "installer started (pid {}); exiting so it can replace this build",
        handle.pid
    );
    Ok(())
}

/// Staging file name derived from the manifest URL's last path segment,
/// restricted to a plain file name.
fn artifact_file_name(url: &str) -> String {
    let raw = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .rsplit('/')
        .next()
        .unwrap_or("docket-update");

    Path::new(raw)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty() && !name.contains(".."))
        .unwrap_or("docket-update")
        .to_string()
}
