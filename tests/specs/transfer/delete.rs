//! Delete job specs

use crate::prelude::*;
use hub_core::test_support::file_entry;
use hub_core::JobStatus;
use hub_driver::DriverCall;

#[tokio::test]
async fn delete_job_succeeds_per_source() {
    let rig = Rig::started();
    rig.driver.insert_stat(file_entry("tmp", "a:tmp", 3));

    let job = rig.engine.submit_delete(vec!["a:tmp".to_string()]).unwrap();
    let done = wait_terminal(&rig.engine, &job.id).await;

    assert_eq!(done.status, JobStatus::Success);
    assert_eq!(done.results.len(), 1);
    assert_eq!(done.results[0].status, JobStatus::Success);
    assert_eq!(done.results[0].source, "a:tmp");
    assert!(done.completed_at.unwrap() >= done.started_at.unwrap());
    assert!(done.started_at.unwrap() >= done.created_at);
}

#[tokio::test]
async fn one_failing_source_fails_the_job_but_not_its_siblings() {
    let rig = Rig::started();
    rig.driver.fail_next_deletes(1);

    let job = rig
        .engine
        .submit_delete(vec!["a:bad".to_string(), "a:good".to_string()])
        .unwrap();
    let done = wait_terminal(&rig.engine, &job.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.results[0].status, JobStatus::Failed);
    assert!(done.results[0].error.is_some());
    assert_eq!(done.results[1].status, JobStatus::Success);

    // Both sources were attempted.
    let deletes: Vec<_> = rig
        .driver
        .calls()
        .into_iter()
        .filter(|c| matches!(c, DriverCall::Delete { .. }))
        .collect();
    assert_eq!(deletes.len(), 2);
}

#[tokio::test]
async fn delete_jobs_carry_no_destination() {
    let rig = Rig::started();
    let job = rig.engine.submit_delete(vec!["a:x".to_string()]).unwrap();
    assert!(job.destination_dir.is_none());
    let done = wait_terminal(&rig.engine, &job.id).await;
    assert!(done.results[0].destination.is_none());
    assert!(!done.results[0].direct_attempted);
    assert!(!done.results[0].fallback_used);
}
