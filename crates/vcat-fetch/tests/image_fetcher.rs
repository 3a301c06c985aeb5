//! Integration tests for `ImageFetcher`.
//!
//! Uses `wiremock` to stand up a local HTTP server for each test so no
//! real network traffic is made.

use std::io::Write;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vcat_fetch::{load_fallback_image, FetchError, ImageFetcher, ImageSource, BUILTIN_FALLBACK_PNG};

fn test_fetcher() -> ImageFetcher {
    ImageFetcher::new(5, "vcat-test/0.1", None).expect("failed to build test ImageFetcher")
}

#[tokio::test]
async fn resolve_returns_downloaded_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a100.png"))
        .and(header("user-agent", "vcat-test/0.1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png-bytes".to_vec()))
        .mount(&server)
        .await;

    let outcome = test_fetcher()
        .resolve(&format!("{}/a100.png", server.uri()))
        .await;

    assert!(!outcome.is_fallback());
    assert_eq!(outcome.bytes(), b"png-bytes");
}

#[tokio::test]
async fn repeated_url_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shared.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"shared".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = test_fetcher();
    let url = format!("{}/shared.png", server.uri());
    let first = fetcher.resolve(&url).await;
    let second = fetcher.resolve(&url).await;

    assert_eq!(first, second);
    assert_eq!(fetcher.cached(), 1);
}

#[tokio::test]
async fn not_found_resolves_to_builtin_fallback_and_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;

    let fetcher = test_fetcher();
    let url = format!("{}/missing.png", server.uri());
    let outcome = fetcher.resolve(&url).await;
    assert!(outcome.is_fallback());
    assert_eq!(outcome.bytes(), BUILTIN_FALLBACK_PNG);

    // A failure is retried on the next call.
    assert!(fetcher.resolve(&url).await.is_fallback());
    assert_eq!(fetcher.cached(), 0);
}

#[tokio::test]
async fn fetch_reports_unexpected_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/boom.png"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = test_fetcher()
        .fetch(&format!("{}/boom.png", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::UnexpectedStatus { status: 503, .. }));
}

#[tokio::test]
async fn fetch_rejects_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/empty.png"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = test_fetcher()
        .fetch(&format!("{}/empty.png", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::EmptyBody { .. }));
}

#[tokio::test]
async fn configured_fallback_file_replaces_builtin() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"placeholder").unwrap();

    let bytes = load_fallback_image(file.path()).await.unwrap();
    let fetcher = ImageFetcher::new(5, "vcat-test/0.1", Some(bytes)).unwrap();
    let outcome = fetcher.resolve("http://127.0.0.1:9/unreachable.png").await;

    assert!(outcome.is_fallback());
    assert_eq!(outcome.bytes(), b"placeholder");
}

#[tokio::test]
async fn missing_fallback_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_fallback_image(&dir.path().join("nope.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::FallbackImage { .. }));
}
