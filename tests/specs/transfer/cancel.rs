//! Job cancellation specs
//!
//! Cancel is immediate for queued jobs and takes effect at the next
//! item boundary for running ones; a copy already in flight is allowed
//! to finish its item.

use crate::prelude::*;
use hub_core::test_support::{file_entry, file_entry_with_md5};
use hub_core::{JobOperation, JobStatus};
use std::time::Duration;

#[tokio::test]
async fn cancelling_a_queued_job_is_immediate() {
    // No workers: everything stays queued.
    let rig = Rig::new();
    let job = rig.engine.submit_delete(vec!["a:x".to_string()]).unwrap();

    let cancelled = rig.engine.cancel(&job.id).unwrap().unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert!(cancelled.completed_at.is_some());

    // Persisted too.
    assert_eq!(
        rig.store.get_job(&job.id).unwrap().unwrap().status,
        JobStatus::Cancelled
    );
}

#[tokio::test]
async fn a_cancelled_queued_job_is_skipped_by_the_worker() {
    let rig = Rig::new();
    let job = rig.engine.submit_delete(vec!["a:x".to_string()]).unwrap();
    rig.engine.cancel(&job.id).unwrap();

    rig.engine.start().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Still cancelled, and the driver never ran.
    assert_eq!(
        rig.engine.get_job(&job.id).unwrap().status,
        JobStatus::Cancelled
    );
    assert!(rig.driver.calls().is_empty());
}

#[tokio::test]
async fn cancel_of_a_running_job_lands_at_the_item_boundary() {
    let rig = Rig::started();
    // Two single-file sources; each copy takes ~100ms.
    for name in ["one", "two"] {
        let source = format!("a:{name}.txt");
        rig.driver
            .insert_stat(file_entry(&format!("{name}.txt"), &source, 1));
        rig.driver.insert_listing(
            &source,
            vec![file_entry_with_md5(
                &format!("{name}.txt"),
                &source,
                1,
                "h",
            )],
        );
        let dest = format!("b:dst/{name}.txt");
        rig.driver.insert_listing(
            &dest,
            vec![file_entry_with_md5(&format!("{name}.txt"), &dest, 1, "h")],
        );
    }
    rig.driver.set_copy_delay(Duration::from_millis(100));

    let job = rig
        .engine
        .submit_transfer(
            JobOperation::Copy,
            vec!["a:one.txt".to_string(), "a:two.txt".to_string()],
            "b:dst".to_string(),
        )
        .unwrap();

    // Cancel while the first item's copy is still in flight.
    tokio::time::sleep(Duration::from_millis(30)).await;
    rig.engine.cancel(&job.id).unwrap();

    let done = wait_terminal(&rig.engine, &job.id).await;
    assert_eq!(done.status, JobStatus::Cancelled);
    // The first item ran to completion; the second never started.
    assert_eq!(done.results.len(), 1);
    assert_eq!(done.results[0].source, "a:one.txt");
    assert_eq!(done.results[0].status, JobStatus::Success);
}
