//! End-to-end checks against a loopback HTTP server: manifest fetch, the
//! update decision, and artifact staging behavior on both the happy path
//! and the failure paths that must leave no files behind.

use std::path::Path;
use std::thread;

use sha2::{Digest, Sha256};
use tiny_http::{Header, Response, Server, StatusCode};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use docket_core::{
    CheckError, DownloadError, DownloadProgress, FetchError, UpdateDecision, check_for_update,
    download_artifact, fetch_latest,
};

/// Serve exactly one request on a loopback port, then shut down. Returns
/// the base URL to hit.
fn serve_once<F>(handler: F) -> String
where
    F: FnOnce(tiny_http::Request) + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("loopback listener should bind");
    let addr = server
        .server_addr()
        .to_ip()
        .expect("loopback listener should have an IP address");
    thread::spawn(move || {
        if let Ok(request) = server.recv() {
            handler(request);
        }
    });
    format!("http://{addr}")
}

/// Serve one connection with a verbatim HTTP response, then shut the socket
/// down. Unlike [`serve_once`], this can cut the connection off mid-body —
/// tiny_http keeps HTTP/1.1 sockets alive, which would leave a client that is
/// still awaiting declared bytes blocked forever. Returns the base URL to hit.
fn serve_once_raw(response: Vec<u8>) -> String {
    use std::io::{Read, Write};

    let listener =
        std::net::TcpListener::bind("127.0.0.1:0").expect("loopback listener should bind");
    let addr = listener
        .local_addr()
        .expect("loopback listener should have an address");
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            // Read the request headers so the client finishes its send before
            // we reply; a single read is enough for these tiny GET requests.
            let mut scratch = [0_u8; 1024];
            let _ = stream.read(&mut scratch);
            let _ = stream.write_all(&response);
            let _ = stream.flush();
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    });
    format!("http://{addr}")
}

fn respond_json(request: tiny_http::Request, body: String) {
    let header = Header::from_bytes("Content-Type", "application/json")
        .expect("static header should parse");
    let _ = request.respond(Response::from_string(body).with_header(header));
}

fn manifest(version: &str, url: &str) -> String {
    serde_json::json!({
        "version": version,
        "url": url,
        "release_date": "2024-05-01",
        "changelog": "Faster spooling",
    })
    .to_string()
}

fn client() -> reqwest::Client {
    docket_core::build_http_client().expect("client should build")
}

fn progress_channel() -> (
    mpsc::Sender<DownloadProgress>,
    mpsc::Receiver<DownloadProgress>,
) {
    mpsc::channel(1024)
}

/// Everything other than `dest` itself that the downloader might have left
/// in the destination directory.
fn leftover_files(dir: &Path, dest: &Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .expect("destination directory should be readable")
        .map(|entry| entry.expect("directory entry should be readable").path())
        .filter(|path| path != dest)
        .collect()
}

#[tokio::test]
async fn check_reports_available_and_preserves_metadata() {
    let url = serve_once(|request| {
        respond_json(request, manifest("1.2.0", "https://example.com/d.run"));
    });

    let decision = check_for_update(&client(), &url, "1.0.0")
        .await
        .expect("check should succeed");

    let UpdateDecision::Available(release) = decision else {
        panic!("expected an available update for 1.0.0 -> 1.2.0");
    };
    assert_eq!(release.version.to_string(), "1.2.0");
    assert_eq!(release.release_date, "2024-05-01");
    assert_eq!(release.changelog, "Faster spooling");
}

#[tokio::test]
async fn check_reports_up_to_date_for_equal_version() {
    let url = serve_once(|request| {
        respond_json(request, manifest("1.0.0", "https://example.com/d.run"));
    });

    let decision = check_for_update(&client(), &url, "1.0.0")
        .await
        .expect("check should succeed");

    assert!(!decision.is_available());
}

#[tokio::test]
async fn check_rejects_malformed_current_version_before_fetching() {
    // No server: the current version is validated first.
    let result = check_for_update(&client(), "http://127.0.0.1:1/unreachable", "1.0").await;

    assert!(matches!(result, Err(CheckError::CurrentVersion(_))));
}

#[tokio::test]
async fn fetch_surfaces_http_status() {
    let url = serve_once(|request| {
        let _ = request.respond(
            Response::from_string("maintenance").with_status_code(StatusCode(503)),
        );
    });

    let result = fetch_latest(&client(), &url).await;

    let Err(FetchError::HttpStatus {
        status,
        body_snippet,
    }) = result
    else {
        panic!("expected HttpStatus error");
    };
    assert_eq!(status.as_u16(), 503);
    assert!(body_snippet.contains("maintenance"));
}

#[tokio::test]
async fn fetch_rejects_body_that_is_not_json() {
    let url = serve_once(|request| {
        let _ = request.respond(Response::from_string("<html>not a manifest</html>"));
    });

    let result = fetch_latest(&client(), &url).await;

    assert!(matches!(result, Err(FetchError::Parse(_))));
}

#[tokio::test]
async fn fetch_rejects_manifest_without_url() {
    let url = serve_once(|request| {
        respond_json(request, r#"{"version": "1.2.0"}"#.to_string());
    });

    let result = fetch_latest(&client(), &url).await;

    assert!(matches!(result, Err(FetchError::MissingField { field: "url" })));
}

#[tokio::test]
async fn download_stages_then_renames_into_place() {
    let body = vec![0xA5_u8; 256 * 1024];
    let expected_len = body.len() as u64;
    let url = serve_once(move |request| {
        // Serve with Content-Length (not chunked) the way a real download
        // host does; tiny_http otherwise chunks bodies above 32 KiB.
        let _ = request.respond(Response::from_data(body).with_chunked_threshold(usize::MAX));
    });

    let dir = tempfile::tempdir().expect("tempdir should be created");
    let dest = dir.path().join("docket-update.run");
    let (tx, mut rx) = progress_channel();
    let cancel = CancellationToken::new();

    // Drain progress concurrently, the way a real caller does.
    let reporter = tokio::spawn(async move {
        let mut last = None;
        while let Some(progress) = rx.recv().await {
            assert_eq!(progress.total, Some(expected_len));
            last = Some(progress.downloaded);
        }
        last
    });

    let artifact = download_artifact(&client(), &url, &dest, None, &cancel, &tx)
        .await
        .expect("download should succeed");
    drop(tx);

    assert_eq!(artifact.path, dest);
    assert_eq!(artifact.size_bytes, expected_len);
    assert_eq!(
        std::fs::metadata(&dest)
            .expect("artifact should exist")
            .len(),
        expected_len
    );
    assert!(
        leftover_files(dir.path(), &dest).is_empty(),
        "no staging files may remain after a successful download"
    );

    let last = reporter.await.expect("progress reporter should finish");
    assert_eq!(last, Some(expected_len));
}

#[tokio::test]
async fn download_replaces_existing_destination() {
    let url = serve_once(|request| {
        let _ = request.respond(Response::from_data(b"new build".to_vec()));
    });

    let dir = tempfile::tempdir().expect("tempdir should be created");
    let dest = dir.path().join("docket-update.run");
    std::fs::write(&dest, b"old build").expect("existing artifact should be written");
    let (tx, _rx) = progress_channel();
    let cancel = CancellationToken::new();

    download_artifact(&client(), &url, &dest, None, &cancel, &tx)
        .await
        .expect("download should succeed");

    let replaced = std::fs::read(&dest).expect("artifact should be readable");
    assert_eq!(replaced, b"new build");
}

#[tokio::test]
async fn interrupted_download_leaves_no_files_behind() {
    // Declare far more bytes than the body carries, then close the
    // connection; the client must treat the transfer as incomplete.
    let short_body = vec![0x5A_u8; 64 * 1024];
    let declared_len = 10 * 1024 * 1024;
    // Advertise a Content-Length far larger than the body we actually send,
    // then close the socket; the client must treat the transfer as cut short.
    let mut response =
        format!("HTTP/1.1 200 OK\r\nContent-Length: {declared_len}\r\n\r\n").into_bytes();
    response.extend_from_slice(&short_body);
    let url = serve_once_raw(response);

    let dir = tempfile::tempdir().expect("tempdir should be created");
    let dest = dir.path().join("docket-update.run");
    let (tx, _rx) = progress_channel();
    let cancel = CancellationToken::new();

    let result = download_artifact(&client(), &url, &dest, None, &cancel, &tx).await;

    assert!(matches!(
        result,
        Err(DownloadError::Interrupted { .. } | DownloadError::LengthMismatch { .. })
    ));
    assert!(!dest.exists(), "no partial artifact may appear at dest");
    assert!(
        leftover_files(dir.path(), &dest).is_empty(),
        "staging file must be removed on failure"
    );
}

#[tokio::test]
async fn download_verifies_matching_checksum() {
    let body = b"release payload".to_vec();
    let digest = format!("{:x}", Sha256::digest(&body));
    let url = serve_once(move |request| {
        let _ = request.respond(Response::from_data(body));
    });

    let dir = tempfile::tempdir().expect("tempdir should be created");
    let dest = dir.path().join("docket-update.run");
    let (tx, _rx) = progress_channel();
    let cancel = CancellationToken::new();

    let artifact = download_artifact(&client(), &url, &dest, Some(&digest), &cancel, &tx)
        .await
        .expect("download with matching digest should succeed");

    assert_eq!(artifact.size_bytes, 15);
}

#[tokio::test]
async fn download_rejects_checksum_mismatch_and_cleans_up() {
    let url = serve_once(|request| {
        let _ = request.respond(Response::from_data(b"release payload".to_vec()));
    });

    let dir = tempfile::tempdir().expect("tempdir should be created");
    let dest = dir.path().join("docket-update.run");
    let (tx, _rx) = progress_channel();
    let cancel = CancellationToken::new();
    let wrong = "0".repeat(64);

    let result = download_artifact(&client(), &url, &dest, Some(&wrong), &cancel, &tx).await;

    assert!(matches!(result, Err(DownloadError::ChecksumMismatch { .. })));
    assert!(!dest.exists());
    assert!(leftover_files(dir.path(), &dest).is_empty());
}

#[tokio::test]
async fn cancelled_download_aborts_and_cleans_up() {
    let url = serve_once(|request| {
        let _ = request.respond(Response::from_data(vec![0_u8; 1024 * 1024]));
    });

    let dir = tempfile::tempdir().expect("tempdir should be created");
    let dest = dir.path().join("docket-update.run");
    let (tx, _rx) = progress_channel();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = download_artifact(&client(), &url, &dest, None, &cancel, &tx).await;

    assert!(matches!(result, Err(DownloadError::Cancelled)));
    assert!(!dest.exists());
    assert!(leftover_files(dir.path(), &dest).is_empty());
}

#[tokio::test]
async fn download_surfaces_http_status_and_cleans_up() {
    let url = serve_once(|request| {
        let _ =
            request.respond(Response::from_string("gone").with_status_code(StatusCode(404)));
    });

    let dir = tempfile::tempdir().expect("tempdir should be created");
    let dest = dir.path().join("docket-update.run");
    let (tx, _rx) = progress_channel();
    let cancel = CancellationToken::new();

    let result = download_artifact(&client(), &url, &dest, None, &cancel, &tx).await;

    let Err(DownloadError::HttpStatus { status }) = result else {
        panic!("expected HttpStatus error");
    };
    assert_eq!(status.as_u16(), 404);
    assert!(leftover_files(dir.path(), &dest).is_empty());
}
