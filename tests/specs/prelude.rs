//! Shared harness for behavioral specifications.

#![allow(dead_code)]

use hub_core::{Job, ScanEvent, Settings};
use hub_driver::FakeDriver;
use hub_engine::{ScanConfig, ScanKind, ScanManager, TransferEngine};
use hub_storage::Store;
use std::sync::Arc;
use std::time::Duration;

pub const SPEC_POLL_INTERVAL: Duration = Duration::from_millis(5);
pub const SPEC_WAIT_ROUNDS: usize = 500;

/// An engine over a scripted driver with its own temp store.
pub struct Rig {
    pub engine: TransferEngine<FakeDriver>,
    pub driver: FakeDriver,
    pub store: Arc<Store>,
    dir: tempfile::TempDir,
}

impl Rig {
    /// Store + engine, not yet started (so queued-state specs work).
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(&dir.path().join("hub.db")).unwrap());
        store
            .set_settings(&Settings {
                staging_path: dir.path().join("staging"),
                ..Settings::default()
            })
            .unwrap();
        let driver = FakeDriver::new();
        let engine = TransferEngine::new(Arc::clone(&store), driver.clone());
        Self {
            engine,
            driver,
            store,
            dir,
        }
    }

    /// Same, with the worker loops running.
    pub fn started() -> Self {
        let rig = Self::new();
        rig.engine.start().unwrap();
        rig
    }

    pub fn staging_root(&self) -> std::path::PathBuf {
        self.dir.path().join("staging")
    }
}

/// Poll until the job reaches a terminal status.
pub async fn wait_terminal(engine: &TransferEngine<FakeDriver>, job_id: &str) -> Job {
    for _ in 0..SPEC_WAIT_ROUNDS {
        if let Some(job) = engine.get_job(job_id) {
            if job.status.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(SPEC_POLL_INTERVAL).await;
    }
    panic!("job {job_id} never reached a terminal status");
}

/// Poll a scan session with a moving cursor until its done event, and
/// return every event seen, in order.
pub async fn drain_scan<K: ScanKind>(
    manager: &ScanManager<FakeDriver, K>,
    id: &str,
) -> Vec<ScanEvent<K::Totals>> {
    let mut events = Vec::new();
    let mut cursor = 0;
    for _ in 0..SPEC_WAIT_ROUNDS {
        let page = manager.poll(id, cursor).unwrap();
        cursor = page.next_seq;
        events.extend(page.events);
        if page.done {
            return events;
        }
        tokio::time::sleep(SPEC_POLL_INTERVAL).await;
    }
    panic!("scan {id} never finished");
}

/// Every event's seq is exactly its predecessor's plus one.
pub fn assert_contiguous<T>(events: &[ScanEvent<T>]) {
    for (index, event) in events.iter().enumerate() {
        assert_eq!(
            event.seq(),
            index as u64 + 1,
            "seq discontinuity at index {index}"
        );
    }
}

/// Scan manager config tuned for fast specs.
pub fn fast_scan_config() -> ScanConfig {
    ScanConfig {
        heartbeat: Duration::from_millis(20),
        per_dir_timeout: Duration::from_secs(5),
        ..ScanConfig::default()
    }
}
