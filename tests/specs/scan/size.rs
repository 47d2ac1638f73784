//! Size walk specs

use crate::prelude::*;
use hub_core::test_support::{dir_entry, file_entry};
use hub_core::{ScanEvent, ScanOutcome};
use hub_driver::FakeDriver;
use hub_engine::{ScanManager, SizeScan};

#[tokio::test]
async fn size_walk_totals_every_file() {
    let driver = FakeDriver::new();
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
    let manager = ScanManager::new(driver, fast_scan_config());
    let id = manager.create("r:root", SizeScan::new());

    let events = drain_scan(&manager, &id).await;
    assert_contiguous(&events);
    // Size walks emit no result events.
    assert!(events
        .iter()
        .all(|e| !matches!(e, ScanEvent::Result { .. })));

    match events.last().unwrap() {
        ScanEvent::Done {
            status,
            scanned_dirs,
            totals,
            ..
        } => {
            assert_eq!(*status, ScanOutcome::Success);
            assert_eq!(*scanned_dirs, 2);
            assert_eq!(totals.files_count, 3);
            assert_eq!(totals.bytes_total, 10 + 2 * 1024 * 1024 + 5);
        }
        other => panic!("expected done last, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_sizes_do_not_poison_the_total() {
    let driver = FakeDriver::new();
    driver.insert_listing(
        "r:root",
        vec![
            file_entry("known", "r:root/known", 7),
            file_entry("unknown", "r:root/unknown", -1),
        ],
    );
    let manager = ScanManager::new(driver, fast_scan_config());
    let id = manager.create("r:root", SizeScan::new());

    let events = drain_scan(&manager, &id).await;
    match events.last().unwrap() {
        ScanEvent::Done { totals, .. } => {
            assert_eq!(totals.files_count, 2);
            assert_eq!(totals.bytes_total, 7);
        }
        other => panic!("expected done last, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_root_still_terminates_with_done() {
    let driver = FakeDriver::new();
    let manager = ScanManager::new(driver, fast_scan_config());
    let id = manager.create("r:empty", SizeScan::new());

    let events = drain_scan(&manager, &id).await;
    assert_eq!(events.len(), 2); // one progress, one done
    match events.last().unwrap() {
        ScanEvent::Done {
            status,
            scanned_dirs,
            totals,
            ..
        } => {
            assert_eq!(*status, ScanOutcome::Success);
            assert_eq!(*scanned_dirs, 1);
            assert_eq!(totals.files_count, 0);
        }
        other => panic!("expected done last, got {other:?}"),
    }
}
