//! Listing mode through the engine

use collection_downloader::downloader::{AcquisitionEngine, AcquisitionError};
use collection_downloader::fetcher::FetcherError;
use collection_downloader::output::csv::CsvRecordSink;
use collection_downloader::shutdown::ShutdownCoordinator;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

use crate::support::{default_config, fast_config, page, RecordingSink, ScriptedListing};

fn engine() -> AcquisitionEngine {
    AcquisitionEngine::new(fast_config()).with_shutdown(ShutdownCoordinator::shared())
}

#[tokio::test]
async fn test_two_pages_accumulate_and_flush_once() {
    let source = ScriptedListing::new(vec![page(0, 100, Some("abc")), page(100, 42, None)]);
    let mut sink = RecordingSink::default();

    let summary = engine().run_listing(&source, &mut sink).await.unwrap();

    assert_eq!(summary.item_count, 142);
    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.error_count, 0);
    assert_eq!(sink.records.len(), 142);
    assert_eq!(sink.appends, 1);

    let requests = source.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].cursor, None);
    assert_eq!(requests[1].cursor.as_deref(), Some("abc"));
    assert!(requests.iter().all(|r| r.page_size == 100));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_page_is_retried_with_backoff() {
    let source = ScriptedListing::new(vec![
        Err(FetcherError::RateLimited),
        Err(FetcherError::RateLimited),
        page(0, 10, None),
    ]);
    let mut sink = Vec::new();
    let engine =
        AcquisitionEngine::new(default_config()).with_shutdown(ShutdownCoordinator::shared());

    let start = Instant::now();
    let summary = engine.run_listing(&source, &mut sink).await.unwrap();

    assert_eq!(summary.item_count, 10);
    assert_eq!(source.requests().len(), 3);
    // 2000ms + 4000ms of backoff; limiter spacing is absorbed by the backoff
    assert!(start.elapsed() >= Duration::from_millis(6000));
}

#[tokio::test(start_paused = true)]
async fn test_pages_are_spaced_by_limiter() {
    let source = ScriptedListing::new(vec![
        page(0, 100, Some("a")),
        page(100, 100, Some("b")),
        page(200, 1, None),
    ]);
    let mut sink = Vec::new();
    let engine =
        AcquisitionEngine::new(default_config()).with_shutdown(ShutdownCoordinator::shared());

    let start = Instant::now();
    engine.run_listing(&source, &mut sink).await.unwrap();

    // 180/min with a 1.2 safety factor is one request every 400ms
    assert!(start.elapsed() >= Duration::from_millis(800));
    assert_eq!(sink.len(), 201);
}

#[tokio::test]
async fn test_not_found_on_first_page_is_an_empty_listing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("listing.csv");
    let source = ScriptedListing::new(vec![Err(FetcherError::NotFound("no collection".into()))]);
    let mut sink = CsvRecordSink::<u32>::new(&path);

    let summary = engine().run_listing(&source, &mut sink).await.unwrap();

    assert_eq!(summary.item_count, 0);
    assert_eq!(summary.output_location, None);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_not_found_after_first_page_keeps_partial_results() {
    let source = ScriptedListing::new(vec![
        page(0, 100, Some("next")),
        Err(FetcherError::NotFound("gone".into())),
    ]);
    let mut sink = Vec::new();

    let summary = engine().run_listing(&source, &mut sink).await.unwrap();

    assert_eq!(summary.item_count, 100);
    assert_eq!(summary.error_count, 0);
    assert_eq!(sink.len(), 100);
}

#[tokio::test]
async fn test_bad_request_on_first_page_aborts() {
    let source = ScriptedListing::new(vec![Err(FetcherError::BadRequest("bad chain".into()))]);
    let mut sink = Vec::new();

    let err = engine().run_listing(&source, &mut sink).await.unwrap_err();

    assert!(matches!(err, AcquisitionError::MalformedRequest(_)));
    assert_eq!(source.requests().len(), 1);
}

#[tokio::test]
async fn test_exhausted_first_page_reports_unreachable() {
    let source = ScriptedListing::new(vec![
        Err(FetcherError::RateLimited),
        Err(FetcherError::RateLimited),
        Err(FetcherError::RateLimited),
    ]);
    let mut sink = Vec::new();

    let err = engine().run_listing(&source, &mut sink).await.unwrap_err();

    match err {
        AcquisitionError::Unreachable { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected Unreachable, got {other:?}"),
    }
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_exhausted_later_page_counts_one_error() {
    let source = ScriptedListing::new(vec![
        page(0, 100, Some("next")),
        Err(FetcherError::Server {
            status: 502,
            message: "bad gateway".into(),
        }),
        Err(FetcherError::Server {
            status: 502,
            message: "bad gateway".into(),
        }),
        Err(FetcherError::Server {
            status: 502,
            message: "bad gateway".into(),
        }),
    ]);
    let mut sink = Vec::new();

    let summary = engine().run_listing(&source, &mut sink).await.unwrap();

    assert_eq!(summary.item_count, 100);
    assert_eq!(summary.error_count, 1);
    assert_eq!(source.requests().len(), 4);
}

#[tokio::test]
async fn test_fatal_error_flushes_partial_results_before_failing() {
    let source = ScriptedListing::new(vec![
        page(0, 100, Some("next")),
        Err(FetcherError::Parse("unexpected body".into())),
    ]);
    let mut sink = RecordingSink::default();

    let err = engine().run_listing(&source, &mut sink).await.unwrap_err();

    assert!(matches!(err, AcquisitionError::Source { .. }));
    assert_eq!(sink.records.len(), 100);
    assert_eq!(sink.appends, 1);
}

#[tokio::test]
async fn test_shutdown_stops_before_next_page() {
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();
    let source = ScriptedListing::new(vec![page(0, 100, Some("next"))]);
    let mut sink = Vec::new();

    let summary = AcquisitionEngine::new(fast_config())
        .with_shutdown(shutdown)
        .run_listing(&source, &mut sink)
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.pages_fetched, 0);
    assert!(source.requests().is_empty());
}
