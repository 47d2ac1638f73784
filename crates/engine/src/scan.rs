// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generic cancellable, pollable background scans.
//!
//! One session table serves both scan kinds: a worker walks the tree
//! breadth-first, appending sequence-numbered events that clients read
//! by polling. A janitor cancels abandoned sessions and drops finished
//! ones after a retention window.

use crate::EngineError;
use hub_core::{Entry, ScanEvent, ScanOutcome, ScanPage};
use hub_driver::{CancelFn, DriverApi};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// Janitor sweep interval.
const JANITOR_INTERVAL: Duration = Duration::from_secs(2);

/// Behavior that differs between scan kinds.
pub trait ScanKind: Send + 'static {
    /// Kind-specific counters carried by progress and done events.
    type Totals: Clone + Default + Serialize + Send + 'static;

    /// Examine one listed entry, updating counters. Returning an entry
    /// emits it as a result event.
    fn visit(&mut self, entry: &Entry) -> Option<Entry>;

    /// Snapshot of the counters.
    fn totals(&self) -> Self::Totals;
}

/// Tunables for scan sessions.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Interval between repeated progress events while one listing runs.
    pub heartbeat: Duration,
    /// Deadline for each per-directory listing.
    pub per_dir_timeout: Duration,
    /// A session not polled for this long is cancelled by the janitor.
    pub unpolled_timeout: Duration,
    /// A finished session is kept retrievable for this long.
    pub terminal_retention: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(1),
            per_dir_timeout: Duration::from_secs(30),
            unpolled_timeout: Duration::from_secs(30),
            terminal_retention: Duration::from_secs(300),
        }
    }
}

struct ScanSession<K: ScanKind> {
    kind: K,
    seq: u64,
    scanned_dirs: u64,
    events: Vec<ScanEvent<K::Totals>>,
    cancel_requested: Arc<AtomicBool>,
    done: bool,
    created_at: Instant,
    last_polled_at: Instant,
    done_at: Option<Instant>,
    worker: Option<tokio::task::JoinHandle<()>>,
}

type SessionTable<K> = Arc<Mutex<HashMap<String, ScanSession<K>>>>;

/// Session table plus janitor for one scan kind.
pub struct ScanManager<D: DriverApi, K: ScanKind> {
    driver: D,
    config: ScanConfig,
    sessions: SessionTable<K>,
    janitor: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<D: DriverApi, K: ScanKind> ScanManager<D, K> {
    pub fn new(driver: D, config: ScanConfig) -> Self {
        Self {
            driver,
            config,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            janitor: Mutex::new(None),
        }
    }

    /// Spawn the janitor loop. Idempotent.
    pub fn start(&self) {
        let mut guard = self.janitor.lock();
        if guard.is_some() {
            return;
        }
        let sessions = Arc::clone(&self.sessions);
        let config = self.config.clone();
        *guard = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(JANITOR_INTERVAL);
            loop {
                tick.tick().await;
                sweep(&sessions, &config);
            }
        }));
    }

    /// Create a session and start its walker. Returns the session id.
    pub fn create(&self, root_path: &str, kind: K) -> String {
        let id = Uuid::new_v4().to_string();
        let cancel = Arc::new(AtomicBool::new(false));
        let session = ScanSession {
            kind,
            seq: 0,
            scanned_dirs: 0,
            events: Vec::new(),
            cancel_requested: Arc::clone(&cancel),
            done: false,
            created_at: Instant::now(),
            last_polled_at: Instant::now(),
            done_at: None,
            worker: None,
        };

        let mut sessions = self.sessions.lock();
        sessions.insert(id.clone(), session);
        let worker = tokio::spawn(run_scan(
            self.driver.clone(),
            Arc::clone(&self.sessions),
            self.config.clone(),
            id.clone(),
            cancel,
            root_path.to_string(),
        ));
        if let Some(session) = sessions.get_mut(&id) {
            session.worker = Some(worker);
        }
        id
    }

    /// Events after the cursor, the done flag, and the new cursor.
    /// Also refreshes the session's poll timestamp for the janitor.
    pub fn poll(&self, id: &str, after_seq: u64) -> Result<ScanPage<K::Totals>, EngineError> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| EngineError::ScanNotFound(id.to_string()))?;
        session.last_polled_at = Instant::now();
        let events = session
            .events
            .iter()
            .filter(|e| e.seq() > after_seq)
            .cloned()
            .collect();
        Ok(ScanPage {
            events,
            done: session.done,
            next_seq: session.seq,
        })
    }

    /// Request cancellation; returns whether the session existed. The
    /// walker is not joined synchronously.
    pub fn cancel(&self, id: &str) -> bool {
        match self.sessions.lock().get(id) {
            Some(session) => {
                session.cancel_requested.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Cancel the janitor, flip every session to cancelled, and await
    /// the walkers.
    pub async fn stop(&self) {
        if let Some(janitor) = self.janitor.lock().take() {
            janitor.abort();
        }
        let workers: Vec<_> = {
            let mut sessions = self.sessions.lock();
            sessions
                .drain()
                .filter_map(|(_, mut session)| {
                    session.cancel_requested.store(true, Ordering::SeqCst);
                    session.worker.take()
                })
                .collect()
        };
        for worker in workers {
            worker.abort();
            let _ = worker.await;
        }
    }
}

/// One janitor pass: cancel unpolled sessions, drop aged-out finished
/// ones.
fn sweep<K: ScanKind>(sessions: &Mutex<HashMap<String, ScanSession<K>>>, config: &ScanConfig) {
    let now = Instant::now();
    let mut table = sessions.lock();
    for session in table.values() {
        if !session.done && now.duration_since(session.last_polled_at) > config.unpolled_timeout {
            session.cancel_requested.store(true, Ordering::SeqCst);
        }
    }
    table.retain(|_, session| match (session.done, session.done_at) {
        (true, Some(done_at)) => now.duration_since(done_at) <= config.terminal_retention,
        _ => true,
    });
}

/// Count the directory and emit its first progress event.
fn begin_dir<K: ScanKind>(sessions: &SessionTable<K>, id: &str, current_dir: &str) {
    let mut table = sessions.lock();
    let Some(session) = table.get_mut(id) else { return };
    if session.done {
        return;
    }
    session.scanned_dirs += 1;
    session.seq += 1;
    let event = ScanEvent::Progress {
        seq: session.seq,
        current_dir: current_dir.to_string(),
        scanned_dirs: session.scanned_dirs,
        totals: session.kind.totals(),
    };
    session.events.push(event);
}

/// Re-emit progress for the directory currently being listed. Counters
/// are unchanged, so clients can treat the event as idempotent.
fn emit_heartbeat<K: ScanKind>(sessions: &SessionTable<K>, id: &str, current_dir: &str) {
    let mut table = sessions.lock();
    let Some(session) = table.get_mut(id) else { return };
    if session.done {
        return;
    }
    session.seq += 1;
    let event = ScanEvent::Progress {
        seq: session.seq,
        current_dir: current_dir.to_string(),
        scanned_dirs: session.scanned_dirs,
        totals: session.kind.totals(),
    };
    session.events.push(event);
}

/// Feed one entry to the kind; emit a result event when it matches.
fn visit_entry<K: ScanKind>(sessions: &SessionTable<K>, id: &str, entry: &Entry) {
    let mut table = sessions.lock();
    let Some(session) = table.get_mut(id) else { return };
    if session.done {
        return;
    }
    if let Some(hit) = session.kind.visit(entry) {
        session.seq += 1;
        let event = ScanEvent::Result {
            seq: session.seq,
            entry: hit,
        };
        session.events.push(event);
    }
}

/// Terminate the session. Dropped silently when the session is already
/// done or gone, so the done event stays unique and final.
fn emit_done<K: ScanKind>(
    sessions: &SessionTable<K>,
    id: &str,
    status: ScanOutcome,
    error: Option<String>,
) {
    let mut table = sessions.lock();
    let Some(session) = table.get_mut(id) else { return };
    if session.done {
        return;
    }
    session.done = true;
    session.done_at = Some(Instant::now());
    session.seq += 1;
    let event = ScanEvent::Done {
        seq: session.seq,
        status,
        scanned_dirs: session.scanned_dirs,
        totals: session.kind.totals(),
        error,
    };
    session.events.push(event);
    debug!(
        scan_id = id,
        elapsed_ms = session.created_at.elapsed().as_millis() as u64,
        "scan finished"
    );
}

/// BFS walk over the driver, one cancellable listing per directory.
async fn run_scan<D: DriverApi, K: ScanKind>(
    driver: D,
    sessions: SessionTable<K>,
    config: ScanConfig,
    id: String,
    cancel: Arc<AtomicBool>,
    root_path: String,
) {
    let mut frontier = VecDeque::from([root_path]);
    let should_cancel: CancelFn = {
        let cancel = Arc::clone(&cancel);
        Arc::new(move || cancel.load(Ordering::SeqCst))
    };

    while let Some(current_dir) = frontier.pop_front() {
        if cancel.load(Ordering::SeqCst) {
            emit_done(&sessions, &id, ScanOutcome::Cancelled, None);
            return;
        }

        begin_dir(&sessions, &id, &current_dir);

        let list_fut =
            driver.list_cancellable(&current_dir, Arc::clone(&should_cancel), config.per_dir_timeout);
        tokio::pin!(list_fut);
        let listed = loop {
            tokio::select! {
                result = &mut list_fut => break result,
                _ = tokio::time::sleep(config.heartbeat) => {
                    if cancel.load(Ordering::SeqCst) {
                        emit_done(&sessions, &id, ScanOutcome::Cancelled, None);
                        return;
                    }
                    emit_heartbeat(&sessions, &id, &current_dir);
                }
            }
        };

        let entries = match listed {
            Ok(entries) => entries,
            Err(e) => {
                // A kill triggered by our own cancel predicate comes
                // back as a listing error; keep it a cancellation.
                let message = e.to_string();
                if cancel.load(Ordering::SeqCst) || message.contains("Cancelled by user") {
                    emit_done(&sessions, &id, ScanOutcome::Cancelled, None);
                } else {
                    emit_done(&sessions, &id, ScanOutcome::Failed, Some(message));
                }
                return;
            }
        };

        for entry in &entries {
            if cancel.load(Ordering::SeqCst) {
                emit_done(&sessions, &id, ScanOutcome::Cancelled, None);
                return;
            }
            if entry.is_dir {
                frontier.push_back(entry.path.clone());
            }
            visit_entry(&sessions, &id, entry);
        }
    }

    emit_done(&sessions, &id, ScanOutcome::Success, None);
}

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;
