//! Integration tests for resumable downloads against a mock HTTP server

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::path::Path;

use blockpool_fetch::{DownloadConfig, DownloadError, ResumableDownloader};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const REMOTE_SIZE: usize = 5000;

fn remote_content() -> Vec<u8> {
    (0..REMOTE_SIZE).map(|i| (i * 7 % 256) as u8).collect()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("blockpool_fetch=debug")
        .with_test_writer()
        .try_init();
}

async fn setup() -> (MockServer, Url, TempDir) {
    init_tracing();
    let server = MockServer::start().await;
    let url = Url::parse(&format!("{}/builds/game.pak", server.uri())).unwrap();
    (server, url, TempDir::new().unwrap())
}

fn range_of(request: &Request) -> Option<String> {
    request
        .headers
        .get("range")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn methods(requests: &[Request]) -> Vec<String> {
    requests
        .iter()
        .map(|request| request.method.as_str().to_string())
        .collect()
}

async fn write_local(dest: &Path, contents: &[u8]) {
    tokio::fs::write(dest, contents).await.unwrap();
}

#[tokio::test]
async fn test_resume_partial_download() {
    let (server, url, temp_dir) = setup().await;
    let content = remote_content();
    let dest = temp_dir.path().join("game.pak");
    write_local(&dest, &content[..1000]).await;

    Mock::given(method("GET"))
        .and(path("/builds/game.pak"))
        .and(header("range", "bytes=1000-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 1000-4999/5000")
                .set_body_bytes(content[1000..].to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let downloader = ResumableDownloader::new().unwrap();
    let mut progress = Vec::new();
    let outcome = downloader
        .download(&url, &dest, &mut |percent: f64| progress.push(percent))
        .await
        .unwrap();

    assert_eq!(outcome.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(outcome.resumed_from, 1000);
    assert_eq!(outcome.downloaded_bytes, 4000);
    assert_eq!(outcome.total_bytes, 5000);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), content);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(methods(&requests), vec!["GET"]);
    assert_eq!(range_of(&requests[0]).as_deref(), Some("bytes=1000-"));

    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|w| w[0] < w[1]));
    assert!(progress.iter().all(|&p| p > 20.0));
    assert!((progress[progress.len() - 1] - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_range_not_satisfiable_means_complete() {
    let (server, url, temp_dir) = setup().await;
    let content = remote_content();
    let dest = temp_dir.path().join("game.pak");
    write_local(&dest, &content).await;

    Mock::given(method("GET"))
        .and(header("range", "bytes=5000-"))
        .respond_with(ResponseTemplate::new(416).insert_header("content-range", "bytes */5000"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/builds/game.pak"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-length", "5000")
                .set_body_bytes(content.clone()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let downloader = ResumableDownloader::new().unwrap();
    let outcome = downloader
        .download(&url, &dest, &mut |_: f64| {})
        .await
        .unwrap();

    assert_eq!(outcome.status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(outcome.downloaded_bytes, 0);
    assert_eq!(outcome.total_bytes, 5000);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), content);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(methods(&requests), vec!["GET", "HEAD"]);
}

#[tokio::test]
async fn test_oversized_local_file_is_truncated() {
    let (server, url, temp_dir) = setup().await;
    let content = remote_content();
    let dest = temp_dir.path().join("game.pak");
    let mut local = content.clone();
    local.extend_from_slice(&[0xEE; 1000]);
    write_local(&dest, &local).await;

    Mock::given(method("GET"))
        .and(header("range", "bytes=6000-"))
        .respond_with(ResponseTemplate::new(416).insert_header("content-range", "bytes */5000"))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-length", "5000")
                .set_body_bytes(content.clone()),
        )
        .mount(&server)
        .await;

    let downloader = ResumableDownloader::new().unwrap();
    let outcome = downloader
        .download(&url, &dest, &mut |_: f64| {})
        .await
        .unwrap();

    assert_eq!(outcome.total_bytes, 5000);
    assert_eq!(outcome.downloaded_bytes, 0);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), content);
}

#[tokio::test]
async fn test_full_response_restarts_from_zero() {
    let (server, url, temp_dir) = setup().await;
    let content = remote_content();
    let dest = temp_dir.path().join("game.pak");
    write_local(&dest, &[0xFF; 1000]).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let downloader = ResumableDownloader::new().unwrap();
    let outcome = downloader
        .download(&url, &dest, &mut |_: f64| {})
        .await
        .unwrap();

    assert_eq!(outcome.status, StatusCode::OK);
    assert_eq!(outcome.resumed_from, 0);
    assert_eq!(outcome.downloaded_bytes, 5000);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), content);
}

#[tokio::test]
async fn test_fresh_download_creates_file() {
    let (server, url, temp_dir) = setup().await;
    let content = remote_content();
    let dest = temp_dir.path().join("new.pak");

    Mock::given(method("GET"))
        .and(header("range", "bytes=0-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 0-4999/5000")
                .set_body_bytes(content.clone()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let downloader = ResumableDownloader::new().unwrap();
    let outcome = downloader
        .download(&url, &dest, &mut |_: f64| {})
        .await
        .unwrap();

    assert_eq!(outcome.resumed_from, 0);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), content);
}

#[tokio::test]
async fn test_transient_failure_retries_from_empty() {
    let (server, url, temp_dir) = setup().await;
    let content = remote_content();
    let dest = temp_dir.path().join("game.pak");
    write_local(&dest, &content[..1000]).await;

    Mock::given(method("GET"))
        .and(header("range", "bytes=1000-"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("range", "bytes=0-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 0-4999/5000")
                .set_body_bytes(content.clone()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let downloader = ResumableDownloader::new().unwrap();
    let outcome = downloader
        .download(&url, &dest, &mut |_: f64| {})
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.resumed_from, 0);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), content);

    let requests = server.received_requests().await.unwrap();
    let ranges: Vec<_> = requests.iter().filter_map(range_of).collect();
    assert_eq!(ranges, vec!["bytes=1000-", "bytes=0-"]);
}

#[tokio::test]
async fn test_error_surfaces_after_all_attempts() {
    let (server, url, temp_dir) = setup().await;
    let dest = temp_dir.path().join("game.pak");
    write_local(&dest, &[1u8; 200]).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let downloader = ResumableDownloader::new().unwrap();
    let err = downloader
        .download(&url, &dest, &mut |_: f64| {})
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DownloadError::ServerStatus {
            status: StatusCode::SERVICE_UNAVAILABLE
        }
    ));
    assert_eq!(err.to_string(), "server error: http 503 Service Unavailable");

    // Truncated before each retry, never after the last attempt
    let requests = server.received_requests().await.unwrap();
    let ranges: Vec<_> = requests.iter().filter_map(range_of).collect();
    assert_eq!(ranges, vec!["bytes=200-", "bytes=0-", "bytes=0-"]);
    assert_eq!(tokio::fs::metadata(&dest).await.unwrap().len(), 0);
}

#[tokio::test]
async fn test_single_attempt_configuration() {
    let (server, url, temp_dir) = setup().await;
    let dest = temp_dir.path().join("game.pak");
    write_local(&dest, &[1u8; 200]).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let config = DownloadConfig {
        max_attempts: 1,
        ..DownloadConfig::default()
    };
    let downloader = ResumableDownloader::with_config(config).unwrap();
    let err = downloader
        .download(&url, &dest, &mut |_: f64| {})
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::ServerStatus { .. }));
    // No retry, so the partial file is left alone
    assert_eq!(tokio::fs::metadata(&dest).await.unwrap().len(), 200);
}
