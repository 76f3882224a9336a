//! Integration tests for bulk scanning.

mod common;

use common::{base_pattern, flip_cells, pattern_png, TestLibrary};
use fishlog::core::classifier::AcceptAllClassifier;
use fishlog::core::pipeline::import_scanned;
use fishlog::core::scanner::{BatchScanner, DirectorySource, SourceConfig, SourceItem};
use fishlog::events::{Event, event_channel, ScanEvent};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn near_duplicate_in_source_is_skipped() {
    let source = vec![
        Ok(SourceItem::new(pattern_png(&base_pattern()))),
        Ok(SourceItem::new(pattern_png(&flip_cells(&base_pattern(), 5)))),
        Ok(SourceItem::new(pattern_png(&flip_cells(&base_pattern(), 32)))),
    ];
    let scan = BatchScanner::builder()
        .build()
        .unwrap()
        .scan(source, Arc::new(AcceptAllClassifier::new()));
    let progress = scan.progress();

    let photos = scan.collect_all().await;

    assert_eq!(photos.len(), 2);
    assert_eq!(progress.processed(), 3);
    assert_eq!(progress.fraction(), 1.0);
}

#[tokio::test]
async fn directory_scan_reports_progress_and_imports() {
    let photos_dir = TempDir::new().unwrap();
    std::fs::write(photos_dir.path().join("a.png"), pattern_png(&base_pattern())).unwrap();
    std::fs::write(
        photos_dir.path().join("b.png"),
        pattern_png(&flip_cells(&base_pattern(), 2)),
    )
    .unwrap();
    std::fs::write(
        photos_dir.path().join("c.png"),
        pattern_png(&flip_cells(&base_pattern(), 40)),
    )
    .unwrap();
    std::fs::write(photos_dir.path().join("notes.txt"), "limit: 4 walleye").unwrap();

    let (sender, receiver) = event_channel();
    let scanner = BatchScanner::builder().events(sender).build().unwrap();
    let source = DirectorySource::open(photos_dir.path(), &SourceConfig::default()).unwrap();
    let photos = scanner
        .scan(source, Arc::new(AcceptAllClassifier::labelled("Walleye")))
        .collect_all()
        .await;
    drop(scanner);

    let events: Vec<Event> = receiver.iter().collect();
    assert!(matches!(
        events.first(),
        Some(Event::Scan(ScanEvent::Started { total: 3 }))
    ));
    assert!(matches!(
        events.last(),
        Some(Event::Scan(ScanEvent::Completed { found: 2, processed: 3 }))
    ));
    assert_eq!(photos.len(), 2);

    let library = TestLibrary::new();
    let pipeline = library.pipeline();
    let mut catalog = library.catalog();
    let summary = import_scanned(&pipeline, &mut catalog, photos).await.unwrap();

    assert_eq!(summary.imported.len(), 2);
    assert_eq!(library.catalog().len(), 2);
    assert!(library
        .catalog()
        .records()
        .iter()
        .all(|r| r.species == "Walleye"));
}

#[tokio::test]
async fn abandoning_a_scan_stores_nothing() {
    let library = TestLibrary::new();
    let source = vec![
        Ok(SourceItem::new(pattern_png(&base_pattern()))),
        Ok(SourceItem::new(pattern_png(&flip_cells(&base_pattern(), 40)))),
    ];
    let mut scan = BatchScanner::builder()
        .build()
        .unwrap()
        .scan(source, Arc::new(AcceptAllClassifier::new()));

    assert!(scan.next_photo().await.is_some());
    assert_eq!(scan.progress().fraction(), 0.5);
    drop(scan);

    assert!(library.catalog().is_empty());
}
