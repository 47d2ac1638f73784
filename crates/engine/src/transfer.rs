// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable transfer job queue and worker loops.

use crate::verify::verify_strict;
use crate::EngineError;
use chrono::Utc;
use hub_core::settings::DEFAULT_CONCURRENCY;
use hub_core::{basename, join, Job, JobItemResult, JobOperation, JobStatus, Settings};
use hub_driver::{CommandResult, DriverApi, ProgressFn};
use hub_storage::Store;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

/// Poll interval for the staging admission gate.
const ADMISSION_POLL: Duration = Duration::from_millis(500);

/// Transfer engine: in-memory job table mirroring the store, a FIFO
/// queue of job ids, and the staging-byte admission counter shared by
/// every fallback.
#[derive(Clone)]
pub struct TransferEngine<D: DriverApi> {
    inner: Arc<Inner<D>>,
}

struct Inner<D> {
    store: Arc<Store>,
    driver: D,
    jobs: Mutex<HashMap<String, Job>>,
    cancelled: Mutex<HashSet<String>>,
    queue_tx: mpsc::UnboundedSender<String>,
    queue_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    staging_in_use: AtomicU64,
    workers: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl<D: DriverApi> TransferEngine<D> {
    pub fn new(store: Arc<Store>, driver: D) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                store,
                driver,
                jobs: Mutex::new(HashMap::new()),
                cancelled: Mutex::new(HashSet::new()),
                queue_tx,
                queue_rx: tokio::sync::Mutex::new(queue_rx),
                staging_in_use: AtomicU64::new(0),
                workers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Run the recovery sweep, reload the job table, and spawn the
    /// worker loops. The sweep completes before any worker dequeues, so
    /// interrupted jobs are never re-run.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut workers = self.inner.workers.lock();
        if !workers.is_empty() {
            return Ok(());
        }

        self.inner.store.mark_running_jobs_interrupted()?;
        let jobs = self.inner.store.list_jobs()?;
        {
            let mut table = self.inner.jobs.lock();
            table.clear();
            for job in jobs {
                table.insert(job.id.clone(), job);
            }
        }

        let concurrency = self
            .inner
            .store
            .get_settings()?
            .map(|s| s.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY)
            .max(1);
        for _ in 0..concurrency {
            let engine = self.clone();
            workers.push(tokio::spawn(async move { engine.worker_loop().await }));
        }
        Ok(())
    }

    /// Abort the worker loops. In-flight driver children die with them.
    pub fn stop(&self) {
        for handle in self.inner.workers.lock().drain(..) {
            handle.abort();
        }
    }

    /// Create and enqueue a copy or move job.
    pub fn submit_transfer(
        &self,
        operation: JobOperation,
        sources: Vec<String>,
        destination_dir: String,
    ) -> Result<Job, EngineError> {
        self.enqueue(Job::new(operation, sources, Some(destination_dir)))
    }

    /// Create and enqueue a delete job.
    pub fn submit_delete(&self, sources: Vec<String>) -> Result<Job, EngineError> {
        self.enqueue(Job::new(JobOperation::Delete, sources, None))
    }

    fn enqueue(&self, job: Job) -> Result<Job, EngineError> {
        self.inner.store.upsert_job(&job)?;
        self.inner.jobs.lock().insert(job.id.clone(), job.clone());
        // The receiver lives as long as the engine, so this cannot fail.
        let _ = self.inner.queue_tx.send(job.id.clone());
        Ok(job)
    }

    /// Record a cancel request. A still-queued job is finalized
    /// immediately; a running one is caught at the next item boundary.
    pub fn cancel(&self, job_id: &str) -> Result<Option<Job>, EngineError> {
        let (snapshot, finalized) = {
            let mut jobs = self.inner.jobs.lock();
            let Some(job) = jobs.get_mut(job_id) else {
                return Ok(None);
            };
            self.inner.cancelled.lock().insert(job_id.to_string());
            let finalized = job.status == JobStatus::Queued;
            if finalized {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(Utc::now());
            }
            (job.clone(), finalized)
        };
        if finalized {
            self.inner.store.upsert_job(&snapshot)?;
        }
        Ok(Some(snapshot))
    }

    /// Jobs newest first.
    pub fn list_jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.inner.jobs.lock().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub fn get_job(&self, job_id: &str) -> Option<Job> {
        self.inner.jobs.lock().get(job_id).cloned()
    }

    /// Staging bytes currently admitted.
    pub fn staging_in_use_bytes(&self) -> u64 {
        self.inner.staging_in_use.load(Ordering::SeqCst)
    }

    fn is_cancelled(&self, job_id: &str) -> bool {
        self.inner.cancelled.lock().contains(job_id)
    }

    /// Mutate a job under the table lock, then persist the snapshot.
    fn update_job<F: FnOnce(&mut Job)>(
        &self,
        job_id: &str,
        mutate: F,
    ) -> Result<Option<Job>, EngineError> {
        let snapshot = {
            let mut jobs = self.inner.jobs.lock();
            let Some(job) = jobs.get_mut(job_id) else {
                return Ok(None);
            };
            mutate(job);
            job.clone()
        };
        self.inner.store.upsert_job(&snapshot)?;
        Ok(Some(snapshot))
    }

    fn log_job(&self, job_id: &str, level: &str, message: String) {
        if let Err(e) = self.update_job(job_id, |job| job.push_log(level, message.clone())) {
            warn!(job_id, error = %e, "failed to persist job log");
        }
    }

    fn push_item(&self, job_id: &str, item: JobItemResult) -> Result<(), EngineError> {
        self.update_job(job_id, |job| job.results.push(item))?;
        Ok(())
    }

    async fn worker_loop(self) {
        loop {
            let job_id = {
                let mut queue = self.inner.queue_rx.lock().await;
                match queue.recv().await {
                    Some(id) => id,
                    None => return,
                }
            };

            let Some(job) = self.get_job(&job_id) else {
                continue;
            };
            if self.is_cancelled(&job_id) {
                if job.status == JobStatus::Queued {
                    if let Err(e) = self.update_job(&job_id, |job| {
                        job.status = JobStatus::Cancelled;
                        job.completed_at = Some(Utc::now());
                    }) {
                        warn!(job_id, error = %e, "failed to persist cancelled job");
                    }
                }
                continue;
            }

            if let Err(e) = self.run_job(&job_id).await {
                // A crashing item must not crash the worker.
                warn!(job_id, error = %e, "job crashed unexpectedly");
                self.crash_job(&job_id, &e);
            }
        }
    }

    fn crash_job(&self, job_id: &str, error: &EngineError) {
        let result = self.update_job(job_id, |job| {
            job.status = JobStatus::Failed;
            job.completed_at = Some(Utc::now());
            job.push_log("error", format!("job crashed unexpectedly: {error}"));
            job.push_log("error", format!("{error:?}"));
        });
        if let Err(e) = result {
            warn!(job_id, error = %e, "failed to persist crashed job");
        }
    }

    async fn run_job(&self, job_id: &str) -> Result<(), EngineError> {
        let settings = self.inner.store.get_settings()?.unwrap_or_default();
        let Some(job) = self.update_job(job_id, |job| {
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
        })?
        else {
            return Ok(());
        };

        match job.operation {
            JobOperation::Delete => self.run_delete(job_id, &job).await,
            JobOperation::Copy | JobOperation::Move => {
                self.run_transfer(job_id, &job, &settings).await
            }
        }
    }

    async fn run_delete(&self, job_id: &str, job: &Job) -> Result<(), EngineError> {
        let mut any_failures = false;
        let mut cancelled = false;

        for source in &job.sources {
            if self.is_cancelled(job_id) {
                cancelled = true;
                break;
            }
            let result = self.inner.driver.delete_path(source).await?;
            self.log_job(job_id, "debug", format_result("delete", source, &result));

            let mut item = JobItemResult::new(source.clone());
            if result.success() {
                item.status = JobStatus::Success;
                self.log_job(job_id, "info", format!("deleted {source}"));
            } else {
                any_failures = true;
                let stderr = result.stderr_trimmed();
                item.status = JobStatus::Failed;
                item.error = Some(if stderr.is_empty() {
                    "delete failed".to_string()
                } else {
                    stderr.to_string()
                });
                self.log_job(
                    job_id,
                    "error",
                    format!("delete failed for {source}: {stderr}"),
                );
            }
            self.push_item(job_id, item)?;
        }

        self.finalize(job_id, cancelled, any_failures)
    }

    async fn run_transfer(
        &self,
        job_id: &str,
        job: &Job,
        settings: &Settings,
    ) -> Result<(), EngineError> {
        let destination_dir = job.destination_dir.clone().unwrap_or_default();
        let mut any_failures = false;
        let mut cancelled = false;

        for source in &job.sources {
            if self.is_cancelled(job_id) {
                cancelled = true;
                break;
            }

            let destination = join(&destination_dir, &basename(source)?)?;
            let mut item = JobItemResult::new(source.clone());
            item.destination = Some(destination.clone());
            item.direct_attempted = true;
            self.log_job(
                job_id,
                "info",
                format!("starting {}: {source} -> {destination}", job.operation),
            );

            // Direct stage: server-to-server copy with streamed progress.
            let direct = self.copy_item(job_id, source, &destination).await?;
            self.log_job(job_id, "debug", format_result("direct-copy", source, &direct));

            if !direct.success() {
                self.log_job(
                    job_id,
                    "warning",
                    format!("direct copy failed for {source}, trying fallback"),
                );
                item.fallback_used = true;
                if let Some(error) = self
                    .fallback_copy(job_id, source, &destination, settings)
                    .await?
                {
                    item.status = JobStatus::Failed;
                    item.error = Some(error);
                    any_failures = true;
                    self.push_item(job_id, item)?;
                    continue;
                }
            }

            let verify = verify_strict(&self.inner.driver, source, &destination).await;
            if !verify.passed {
                let error = format!("verification failed: {}", verify.reason);
                self.log_job(job_id, "error", error.clone());
                item.status = JobStatus::Failed;
                item.error = Some(error);
                any_failures = true;
                self.push_item(job_id, item)?;
                continue;
            }
            item.verify_passed = true;

            // The source is only deleted after verification for moves.
            if job.operation == JobOperation::Move {
                let delete = self.inner.driver.delete_path(source).await?;
                self.log_job(
                    job_id,
                    "debug",
                    format_result("post-verify-delete", source, &delete),
                );
                if !delete.success() {
                    let error = format!(
                        "copy verified but source delete failed: {}",
                        delete.stderr_trimmed()
                    );
                    self.log_job(job_id, "error", error.clone());
                    item.status = JobStatus::Failed;
                    item.error = Some(error);
                    any_failures = true;
                    self.push_item(job_id, item)?;
                    continue;
                }
            }

            item.status = JobStatus::Success;
            self.push_item(job_id, item)?;
            self.log_job(
                job_id,
                "info",
                format!("completed {}: {source}", job.operation),
            );
        }

        self.finalize(job_id, cancelled, any_failures)
    }

    fn finalize(&self, job_id: &str, cancelled: bool, any_failures: bool) -> Result<(), EngineError> {
        self.update_job(job_id, |job| {
            job.status = if cancelled {
                JobStatus::Cancelled
            } else if any_failures {
                JobStatus::Failed
            } else {
                JobStatus::Success
            };
            job.completed_at = Some(Utc::now());
        })?;
        Ok(())
    }

    async fn copy_item(
        &self,
        job_id: &str,
        source: &str,
        destination: &str,
    ) -> Result<CommandResult, EngineError> {
        let entry = self.inner.driver.stat(source).await?;
        let progress = self.progress_logger(job_id, source, "direct");
        let result = if entry.is_dir {
            self.inner
                .driver
                .copy_dir(source, destination, Some(progress))
                .await?
        } else {
            self.inner
                .driver
                .copy_file(source, destination, Some(progress))
                .await?
        };
        Ok(result)
    }

    /// Pull the source into a unique staging subdirectory, then push it
    /// to the destination. Returns the failure reason, if any.
    ///
    /// Admission: waits until the estimated bytes fit under the staging
    /// cap shared by all concurrent fallbacks, and always releases them
    /// (and the staged files) on the way out.
    async fn fallback_copy(
        &self,
        job_id: &str,
        source: &str,
        destination: &str,
        settings: &Settings,
    ) -> Result<Option<String>, EngineError> {
        tokio::fs::create_dir_all(&settings.staging_path).await?;
        let estimate = self.estimate_source_size(source).await;

        loop {
            let in_use = self.inner.staging_in_use.load(Ordering::SeqCst);
            if in_use.saturating_add(estimate) <= settings.staging_cap_bytes {
                if self
                    .inner
                    .staging_in_use
                    .compare_exchange(in_use, in_use + estimate, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    break;
                }
                // Lost the race; re-read and retry without sleeping.
                continue;
            }
            self.log_job(
                job_id,
                "debug",
                format!(
                    "staging cap wait: estimate={estimate} in_use={in_use} cap={}",
                    settings.staging_cap_bytes
                ),
            );
            tokio::time::sleep(ADMISSION_POLL).await;
        }

        let staging_dir = settings.staging_path.join(Uuid::new_v4().simple().to_string());
        let local_path = staging_dir.join(basename(source)?);
        let outcome = self
            .fallback_transfer(job_id, source, destination, &local_path)
            .await;

        let _ = tokio::fs::remove_dir_all(&staging_dir).await;
        let _ = self
            .inner
            .staging_in_use
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |in_use| {
                Some(in_use.saturating_sub(estimate))
            });

        outcome
    }

    async fn fallback_transfer(
        &self,
        job_id: &str,
        source: &str,
        destination: &str,
        local_path: &Path,
    ) -> Result<Option<String>, EngineError> {
        let entry = self.inner.driver.stat(source).await?;

        let pull_progress = self.progress_logger(job_id, source, "fallback-pull");
        let pull = if entry.is_dir {
            self.inner
                .driver
                .pull_dir(source, local_path, Some(pull_progress))
                .await?
        } else {
            self.inner
                .driver
                .pull_file(source, local_path, Some(pull_progress))
                .await?
        };
        self.log_job(job_id, "debug", format_result("fallback-pull", source, &pull));
        if !pull.success() {
            return Ok(Some(format!(
                "fallback download failed: {}",
                pull.stderr_trimmed()
            )));
        }

        let push_progress = self.progress_logger(job_id, source, "fallback-push");
        let push = if entry.is_dir {
            self.inner
                .driver
                .push_dir(local_path, destination, Some(push_progress))
                .await?
        } else {
            self.inner
                .driver
                .push_file(local_path, destination, Some(push_progress))
                .await?
        };
        self.log_job(job_id, "debug", format_result("fallback-push", source, &push));
        if !push.success() {
            return Ok(Some(format!(
                "fallback upload failed: {}",
                push.stderr_trimmed()
            )));
        }

        Ok(None)
    }

    /// Recursive listing sum. A failed listing estimates 0 so the
    /// admission gate stays live.
    async fn estimate_source_size(&self, source: &str) -> u64 {
        match self.inner.driver.list(source, true).await {
            Ok(entries) => entries
                .iter()
                .filter(|e| !e.is_dir)
                .map(|e| e.size.max(0) as u64)
                .sum(),
            Err(_) => 0,
        }
    }

    /// Progress callback that logs deduplicated percentage lines into
    /// the job log at info level.
    fn progress_logger(&self, job_id: &str, source: &str, stage: &str) -> ProgressFn {
        let engine = self.clone();
        let job_id = job_id.to_string();
        let source = source.to_string();
        let stage = stage.to_string();
        let last_line = Mutex::new(String::new());
        Arc::new(move |raw: &str| {
            let line = raw.split_whitespace().collect::<Vec<_>>().join(" ");
            if line.is_empty() {
                return;
            }
            {
                let last = last_line.lock();
                if *last == line {
                    return;
                }
            }
            if !line.contains('%') && !line.contains("Transferred:") {
                return;
            }
            *last_line.lock() = line.clone();
            engine.log_job(&job_id, "info", format!("progress [{stage}] {source} {line}"));
        })
    }
}

fn format_result(stage: &str, source: &str, result: &CommandResult) -> String {
    let stdout: String = result.stdout.trim().chars().take(300).collect();
    let stderr: String = result.stderr.trim().chars().take(500).collect();
    format!(
        "{stage} source={source} rc={} timed_out={} duration_ms={} stdout='{stdout}' stderr='{stderr}'",
        result.returncode, result.timed_out, result.duration_ms
    )
}

#[cfg(test)]
#[path = "transfer_tests.rs"]
mod tests;
