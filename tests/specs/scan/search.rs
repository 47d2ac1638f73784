//! Search streaming specs

use crate::prelude::*;
use hub_core::test_support::{dir_entry, file_entry};
use hub_core::{ScanEvent, ScanOutcome};
use hub_driver::FakeDriver;
use hub_engine::{ScanManager, SearchScan};

/// `r:root/{small.txt, sub/{big.bin, nested.txt}}`
fn seed_tree(driver: &FakeDriver) {
    driver.insert_listing(
        "r:root",
        vec![
            file_entry("small.txt", "r:root/small.txt", 10),
            dir_entry("sub", "r:root/sub"),
        ],
    );
    driver.insert_listing(
        "r:root/sub",
        vec![
            file_entry("big.bin", "r:root/sub/big.bin", 2 * 1024 * 1024),
            file_entry("nested.txt", "r:root/sub/nested.txt", 5),
        ],
    );
}

#[tokio::test]
async fn search_streams_progress_results_and_done() {
    let driver = FakeDriver::new();
    seed_tree(&driver);
    let manager = ScanManager::new(driver, fast_scan_config());
    let id = manager.create("r:root", SearchScan::new("*.txt", false, None).unwrap());

    let events = drain_scan(&manager, &id).await;
    assert_contiguous(&events);

    let progress_dirs: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::Progress { current_dir, .. } => Some(current_dir.as_str()),
            _ => None,
        })
        .collect();
    assert!(progress_dirs.contains(&"r:root"));
    assert!(progress_dirs.contains(&"r:root/sub"));

    let results: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::Result { entry, .. } => Some(entry.name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(results, vec!["small.txt", "nested.txt"]);

    match events.last().unwrap() {
        ScanEvent::Done {
            status,
            scanned_dirs,
            totals,
            error,
            ..
        } => {
            assert_eq!(*status, ScanOutcome::Success);
            assert_eq!(*scanned_dirs, 2);
            assert_eq!(totals.matched_count, 2);
            assert!(error.is_none());
        }
        other => panic!("expected done last, got {other:?}"),
    }
}

#[tokio::test]
async fn min_size_filter_applies_to_files_but_not_directories() {
    let driver = FakeDriver::new();
    seed_tree(&driver);
    let manager = ScanManager::new(driver, fast_scan_config());
    // `*sub*` matches the directory by name; small text files are
    // excluded by the 1 MiB floor.
    let id = manager.create(
        "r:root",
        SearchScan::new("*sub*", false, Some(1.0)).unwrap(),
    );

    let events = drain_scan(&manager, &id).await;
    let results: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::Result { entry, .. } => Some(entry),
            _ => None,
        })
        .collect();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "sub");
    assert!(results[0].is_dir);
    assert_eq!(results[0].parent_path.as_deref(), Some("r:root"));

    match events.last().unwrap() {
        ScanEvent::Done { totals, .. } => assert_eq!(totals.matched_count, 1),
        other => panic!("expected done last, got {other:?}"),
    }
}

#[tokio::test]
async fn polling_with_a_cursor_never_replays_events() {
    let driver = FakeDriver::new();
    seed_tree(&driver);
    let manager = ScanManager::new(driver, fast_scan_config());
    let id = manager.create("r:root", SearchScan::new("*", false, None).unwrap());

    let events = drain_scan(&manager, &id).await;
    let seqs: Vec<u64> = events.iter().map(ScanEvent::seq).collect();
    let mut deduped = seqs.clone();
    deduped.dedup();
    assert_eq!(seqs, deduped, "a cursor poll replayed an event");

    // The cursor at the end returns nothing new.
    let page = manager.poll(&id, seqs.last().copied().unwrap()).unwrap();
    assert!(page.events.is_empty());
    assert!(page.done);
}

#[tokio::test]
async fn failed_listing_ends_the_search_as_failed() {
    let driver = FakeDriver::new();
    driver.fail_listing("r:broken");
    let manager = ScanManager::new(driver, fast_scan_config());
    let id = manager.create("r:broken", SearchScan::new("*", false, None).unwrap());

    let events = drain_scan(&manager, &id).await;
    match events.last().unwrap() {
        ScanEvent::Done { status, error, .. } => {
            assert_eq!(*status, ScanOutcome::Failed);
            assert!(error.is_some());
        }
        other => panic!("expected done last, got {other:?}"),
    }
}
