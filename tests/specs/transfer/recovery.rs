//! Crash recovery specs
//!
//! A job that was `running` when the process died is recovered as
//! `interrupted` at engine start, before any worker dequeues, and is
//! never re-run.

use crate::prelude::*;
use hub_core::{Job, JobOperation, JobStatus};
use hub_driver::FakeDriver;
use hub_engine::TransferEngine;
use std::sync::Arc;
use std::time::Duration;

/// A job as the previous process would have left it mid-execution.
fn stranded_running_job() -> Job {
    let mut job = Job::new(
        JobOperation::Copy,
        vec!["a:src".to_string()],
        Some("b:dst".to_string()),
    );
    job.status = JobStatus::Running;
    job
}

#[tokio::test]
async fn running_jobs_become_interrupted_at_boot() {
    let rig = Rig::new();
    let stranded = stranded_running_job();
    rig.store.upsert_job(&stranded).unwrap();

    rig.engine.start().unwrap();

    let recovered = rig.engine.get_job(&stranded.id).unwrap();
    assert_eq!(recovered.status, JobStatus::Interrupted);
    assert!(recovered.completed_at.is_some());

    // Durable copy agrees with the in-memory table.
    let persisted = rig.store.get_job(&stranded.id).unwrap().unwrap();
    assert_eq!(persisted.status, JobStatus::Interrupted);

    // The worker never touches it: no driver calls happen.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rig.driver.calls().is_empty());
}

#[tokio::test]
async fn no_job_is_running_after_the_sweep() {
    let rig = Rig::new();
    for _ in 0..3 {
        rig.store.upsert_job(&stranded_running_job()).unwrap();
    }

    rig.store.mark_running_jobs_interrupted().unwrap();
    assert!(rig
        .store
        .list_jobs()
        .unwrap()
        .iter()
        .all(|j| j.status != JobStatus::Running));
}

#[tokio::test]
async fn recovery_survives_a_second_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("hub.db");

    let stranded_id = {
        let store = Arc::new(hub_storage::Store::open(&db).unwrap());
        let job = stranded_running_job();
        store.upsert_job(&job).unwrap();
        job.id
    };

    // First boot recovers; second boot sees a stable terminal state.
    for _ in 0..2 {
        let store = Arc::new(hub_storage::Store::open(&db).unwrap());
        let engine = TransferEngine::new(store, FakeDriver::new());
        engine.start().unwrap();
        assert_eq!(
            engine.get_job(&stranded_id).unwrap().status,
            JobStatus::Interrupted
        );
    }
}
