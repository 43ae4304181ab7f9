//! Download mode through the engine

use collection_downloader::downloader::{
    AcquisitionEngine, AcquisitionError, DownloadPlan,
};
use collection_downloader::output::files::FsItemSink;
use collection_downloader::output::ArtifactKind;
use collection_downloader::shutdown::ShutdownCoordinator;
use tempfile::TempDir;

use crate::support::{fast_config, MockItems};

fn engine() -> AcquisitionEngine {
    AcquisitionEngine::new(fast_config()).with_shutdown(ShutdownCoordinator::shared())
}

fn both() -> Vec<ArtifactKind> {
    vec![ArtifactKind::Image, ArtifactKind::Metadata]
}

#[tokio::test]
async fn test_downloads_every_artifact_in_range() {
    let dir = TempDir::new().unwrap();
    let sink = FsItemSink::new(dir.path());
    let items = MockItems::with_ids(1..=4);

    let summary = engine()
        .run_download(&items, &sink, &DownloadPlan::new(1, 4, both()))
        .await
        .unwrap();

    assert_eq!(summary.total, 4);
    assert_eq!(summary.item_count, 4);
    assert_eq!(summary.skipped_count, 0);
    assert_eq!(summary.output_location.as_deref(), Some(dir.path()));
    for id in 1..=4 {
        assert!(sink.path_for(ArtifactKind::Image, id).exists());
        assert!(sink.path_for(ArtifactKind::Metadata, id).exists());
    }
    let image = std::fs::read(sink.path_for(ArtifactKind::Image, 2)).unwrap();
    assert_eq!(image, b"image-2");
}

#[tokio::test]
async fn test_second_run_is_served_from_disk() {
    let dir = TempDir::new().unwrap();
    let sink = FsItemSink::new(dir.path());
    let plan = DownloadPlan::new(1, 3, both());

    let first = MockItems::with_ids(1..=3);
    engine().run_download(&first, &sink, &plan).await.unwrap();
    assert_eq!(first.calls(), 6);

    let second = MockItems::with_ids(1..=3);
    let summary = engine().run_download(&second, &sink, &plan).await.unwrap();

    assert_eq!(second.calls(), 0);
    assert_eq!(summary.item_count, 0);
    assert_eq!(summary.skipped_count, 3);
}

#[tokio::test]
async fn test_missing_ids_are_skipped() {
    let dir = TempDir::new().unwrap();
    let sink = FsItemSink::new(dir.path());
    let items = MockItems::with_ids([1, 3]);

    let summary = engine()
        .run_download(&items, &sink, &DownloadPlan::new(1, 3, both()))
        .await
        .unwrap();

    assert_eq!(summary.item_count, 2);
    assert_eq!(summary.skipped_count, 1);
    assert_eq!(summary.error_count, 0);
    assert!(!sink.path_for(ArtifactKind::Image, 2).exists());
}

#[tokio::test]
async fn test_persistent_timeouts_fail_the_item() {
    let dir = TempDir::new().unwrap();
    let sink = FsItemSink::new(dir.path());
    let mut items = MockItems::with_ids(1..=2);
    items.failing.insert(2);

    let summary = engine()
        .run_download(&items, &sink, &DownloadPlan::new(1, 2, vec![ArtifactKind::Image]))
        .await
        .unwrap();

    assert_eq!(summary.item_count, 1);
    assert_eq!(summary.error_count, 1);
    // 1 for id 1, 3 attempts for id 2
    assert_eq!(items.calls(), 4);
}

#[tokio::test]
async fn test_inverted_range_is_rejected() {
    let dir = TempDir::new().unwrap();
    let sink = FsItemSink::new(dir.path());
    let items = MockItems::with_ids(1..=2);

    let err = engine()
        .run_download(&items, &sink, &DownloadPlan::new(5, 1, both()))
        .await
        .unwrap_err();

    assert!(matches!(err, AcquisitionError::Configuration(_)));
    assert_eq!(items.calls(), 0);
}

#[tokio::test]
async fn test_uncountable_range_is_rejected() {
    let dir = TempDir::new().unwrap();
    let sink = FsItemSink::new(dir.path());
    let items = MockItems::with_ids(0..=2);

    let err = engine()
        .run_download(&items, &sink, &DownloadPlan::new(0, u64::MAX, both()))
        .await
        .unwrap_err();

    assert!(matches!(err, AcquisitionError::Configuration(_)));
    assert_eq!(items.calls(), 0);
}
