//! Scan cancellation specs

use crate::prelude::*;
use hub_core::test_support::{dir_entry, file_entry};
use hub_core::{ScanEvent, ScanOutcome};
use hub_driver::FakeDriver;
use hub_engine::{ScanManager, SearchScan, SizeScan};
use std::time::Duration;

#[tokio::test]
async fn cancelling_a_slow_scan_yields_a_final_cancelled_done() {
    let driver = FakeDriver::new();
    driver.insert_listing("r:slow", vec![file_entry("f", "r:slow/f", 1)]);
    driver.set_list_delay(Duration::from_millis(500));
    let manager = ScanManager::new(driver, fast_scan_config());
    let id = manager.create("r:slow", SizeScan::new());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(manager.cancel(&id));

    let events = drain_scan(&manager, &id).await;
    assert_contiguous(&events);

    let done = events.last().unwrap();
    match done {
        ScanEvent::Done { status, error, .. } => {
            assert_eq!(*status, ScanOutcome::Cancelled);
            assert!(error.is_none());
        }
        other => panic!("expected done last, got {other:?}"),
    }
    // Exactly one done event, and nothing after it.
    assert_eq!(events.iter().filter(|e| e.is_done()).count(), 1);
    let after = manager.poll(&id, done.seq()).unwrap();
    assert!(after.events.is_empty());
    assert!(after.done);
}

#[tokio::test]
async fn cancel_between_directories_stops_the_walk() {
    let driver = FakeDriver::new();
    driver.insert_listing(
        "r:root",
        vec![
            dir_entry("a", "r:root/a"),
            dir_entry("b", "r:root/b"),
        ],
    );
    driver.insert_listing("r:root/a", vec![]);
    driver.insert_listing("r:root/b", vec![]);
    driver.set_list_delay(Duration::from_millis(100));
    let manager = ScanManager::new(driver, fast_scan_config());
    let id = manager.create("r:root", SearchScan::new("*", false, None).unwrap());

    tokio::time::sleep(Duration::from_millis(30)).await;
    manager.cancel(&id);

    let events = drain_scan(&manager, &id).await;
    match events.last().unwrap() {
        ScanEvent::Done { status, .. } => assert_eq!(*status, ScanOutcome::Cancelled),
        other => panic!("expected done last, got {other:?}"),
    }
}

#[tokio::test]
async fn cancel_of_an_unknown_session_reports_missing() {
    let driver = FakeDriver::new();
    let manager: ScanManager<FakeDriver, SizeScan> =
        ScanManager::new(driver, fast_scan_config());
    assert!(!manager.cancel("missing"));
    assert!(manager.poll("missing", 0).is_err());
}

#[tokio::test]
async fn stop_tears_down_all_sessions() {
    let driver = FakeDriver::new();
    driver.set_list_delay(Duration::from_secs(30));
    let manager = ScanManager::new(driver, fast_scan_config());
    manager.start();
    let search_id = manager.create("r:x", SizeScan::new());
    let size_id = manager.create("r:y", SizeScan::new());

    manager.stop().await;
    assert!(manager.poll(&search_id, 0).is_err());
    assert!(manager.poll(&size_id, 0).is_err());
}
