//! Fallback copy specs
//!
//! A failed direct copy routes through local staging: pull, push,
//! verify, and (for moves) delete the source only after verification.

use crate::prelude::*;
use hub_core::test_support::{dir_entry, file_entry_with_md5};
use hub_core::{JobOperation, JobStatus};
use hub_driver::DriverCall;

/// Single-file source directory whose destination listing matches
/// byte-for-byte (same size, same md5).
fn seed_matching_tree(rig: &Rig) {
    rig.driver.insert_stat(dir_entry("src", "a:src"));
    rig.driver.insert_listing(
        "a:src",
        vec![file_entry_with_md5("f.txt", "a:src/f.txt", 1, "a")],
    );
    rig.driver.insert_listing(
        "b:dst/src",
        vec![file_entry_with_md5("f.txt", "b:dst/src/f.txt", 1, "a")],
    );
}

#[tokio::test]
async fn fallback_copy_succeeds_after_direct_failure() {
    let rig = Rig::started();
    seed_matching_tree(&rig);
    rig.driver.fail_next_direct_copies(1);

    let job = rig
        .engine
        .submit_transfer(
            JobOperation::Copy,
            vec!["a:src".to_string()],
            "b:dst".to_string(),
        )
        .unwrap();
    let done = wait_terminal(&rig.engine, &job.id).await;

    assert_eq!(done.status, JobStatus::Success);
    assert_eq!(done.results.len(), 1);
    let item = &done.results[0];
    assert!(item.direct_attempted);
    assert!(item.fallback_used);
    assert!(item.verify_passed);
    assert_eq!(item.status, JobStatus::Success);
    assert_eq!(item.destination.as_deref(), Some("b:dst/src"));
}

#[tokio::test]
async fn staging_bytes_return_to_zero_after_fallback() {
    let rig = Rig::started();
    seed_matching_tree(&rig);
    rig.driver.fail_next_direct_copies(1);

    let job = rig
        .engine
        .submit_transfer(
            JobOperation::Copy,
            vec!["a:src".to_string()],
            "b:dst".to_string(),
        )
        .unwrap();
    wait_terminal(&rig.engine, &job.id).await;

    assert_eq!(rig.engine.staging_in_use_bytes(), 0);
}

#[tokio::test]
async fn fallback_pull_lands_under_the_staging_root() {
    let rig = Rig::started();
    seed_matching_tree(&rig);
    rig.driver.fail_next_direct_copies(1);

    let job = rig
        .engine
        .submit_transfer(
            JobOperation::Copy,
            vec!["a:src".to_string()],
            "b:dst".to_string(),
        )
        .unwrap();
    wait_terminal(&rig.engine, &job.id).await;

    let staging_root = rig.staging_root();
    let pulled_to = rig.driver.calls().into_iter().find_map(|call| match call {
        DriverCall::PullDir { local, .. } => Some(local),
        _ => None,
    });
    let pulled_to = pulled_to.expect("fallback never pulled");
    assert!(
        pulled_to.starts_with(&staging_root),
        "{pulled_to:?} not under {staging_root:?}"
    );
    assert!(pulled_to.ends_with("src"));
}

#[tokio::test]
async fn fallback_with_unverifiable_destination_fails_the_item() {
    let rig = Rig::started();
    rig.driver.insert_stat(dir_entry("src", "a:src"));
    rig.driver.insert_listing("a:src", vec![]);
    // Direct fails, both fallback legs succeed, but the destination
    // cannot be listed for verification.
    rig.driver.fail_next_direct_copies(1);
    rig.driver.fail_listing("b:dst/src");

    let job = rig
        .engine
        .submit_transfer(
            JobOperation::Copy,
            vec!["a:src".to_string()],
            "b:dst".to_string(),
        )
        .unwrap();
    let done = wait_terminal(&rig.engine, &job.id).await;

    // The push succeeded but verification could not list the
    // destination, so the item fails with a verification reason.
    assert_eq!(done.status, JobStatus::Failed);
    let item = &done.results[0];
    assert!(item.fallback_used);
    assert!(item
        .error
        .as_deref()
        .unwrap()
        .contains("unable to list for verification"));
}

#[tokio::test]
async fn move_deletes_the_source_only_after_verification() {
    let rig = Rig::started();
    seed_matching_tree(&rig);
    rig.driver.fail_next_direct_copies(1);

    let job = rig
        .engine
        .submit_transfer(
            JobOperation::Move,
            vec!["a:src".to_string()],
            "b:dst".to_string(),
        )
        .unwrap();
    let done = wait_terminal(&rig.engine, &job.id).await;

    assert_eq!(done.status, JobStatus::Success);
    let item = &done.results[0];
    assert!(item.direct_attempted && item.fallback_used && item.verify_passed);

    // Ordering: the delete happened after both fallback legs.
    let calls = rig.driver.calls();
    let push_at = calls
        .iter()
        .position(|c| matches!(c, DriverCall::PushDir { .. }))
        .unwrap();
    let delete_at = calls
        .iter()
        .position(|c| c == &DriverCall::Delete { path: "a:src".to_string() })
        .unwrap();
    assert!(delete_at > push_at);
}
